//! Opaque binary export.
//!
//! For each exported row: the raw little-endian bytes of every bound
//! selected column's identifier, concatenated in selection order. No
//! header, no separators. Row width is the number of bound selected
//! columns times the identifier size.

use super::{row_range, selected_variable_columns, STREAM_EXPORT_OP};
use crate::error::Result;
use std::ops::Range;
use tessera_core::{CancellationHandle, LimitOffset, SharedResult};
use tessera_query::{QueryExecutionTree, SelectClause};

/// Streaming binary export of a SELECT result.
#[derive(Debug)]
pub struct BinaryStream {
    result: SharedResult,
    /// Bound selected columns only.
    columns: Vec<usize>,
    rows: Range<usize>,
    cancellation: CancellationHandle,
    failed: bool,
}

impl BinaryStream {
    pub(crate) fn new(
        select: &SelectClause,
        tree: &QueryExecutionTree,
        result: SharedResult,
        limit_offset: &LimitOffset,
        cancellation: CancellationHandle,
    ) -> BinaryStream {
        let rows = row_range(limit_offset, &result);
        let columns = selected_variable_columns(select, tree, true)
            .into_iter()
            .flatten()
            .map(|column| column.column)
            .collect();
        BinaryStream {
            result,
            columns,
            rows,
            cancellation,
            failed: false,
        }
    }
}

impl Iterator for BinaryStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let row = self.rows.next()?;
        if let Err(cancelled) = self.cancellation.check(STREAM_EXPORT_OP) {
            self.failed = true;
            return Some(Err(cancelled.into()));
        }
        let table = self.result.id_table();
        let mut out = Vec::with_capacity(self.columns.len() * tessera_core::ID_SIZE);
        for &column in &self.columns {
            out.extend_from_slice(&table.at(row, column).to_le_bytes());
        }
        Some(Ok(out))
    }
}
