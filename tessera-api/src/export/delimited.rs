//! CSV and TSV export.
//!
//! Header first (CSV strips the leading `?` from variable names, TSV keeps
//! it), then one line per exported row. Cells resolve through the facade;
//! for CSV the remove-quotes flag is set so cells carry the raw lexical
//! form. Separators are emitted for every selected column slot, bound or
//! not; unresolved cells stay empty.

use super::construct::ConstructTriples;
use super::{row_range, selected_variable_columns, ColumnIndexAndVariable, STREAM_EXPORT_OP};
use crate::error::Result;
use crate::escape::{escape_for_csv, escape_for_tsv};
use std::ops::Range;
use tessera_core::{
    id_to_string_and_type, CancellationHandle, Index, LimitOffset, ResolveFlags, SharedResult,
};
use tessera_query::{ParsedQuery, QueryExecutionTree, SelectClause};

/// Cell separator of the delimited formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    #[inline]
    fn byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }

    fn escape(self, value: &str) -> String {
        match self {
            Delimiter::Tab => escape_for_tsv(value),
            Delimiter::Comma => escape_for_csv(value),
        }
    }
}

/// Streaming CSV/TSV export of a SELECT result.
#[derive(Debug)]
pub struct DelimitedStream<'a> {
    index: &'a Index,
    result: SharedResult,
    columns: Vec<Option<ColumnIndexAndVariable>>,
    header: Option<Vec<u8>>,
    rows: Range<usize>,
    delimiter: Delimiter,
    cancellation: CancellationHandle,
    failed: bool,
}

impl<'a> DelimitedStream<'a> {
    pub(crate) fn new(
        select: &SelectClause,
        tree: &QueryExecutionTree,
        index: &'a Index,
        result: SharedResult,
        limit_offset: &LimitOffset,
        delimiter: Delimiter,
        cancellation: CancellationHandle,
    ) -> DelimitedStream<'a> {
        let rows = row_range(limit_offset, &result);
        let columns = selected_variable_columns(select, tree, true);

        // Header line: selected variable names; CSV drops the leading `?`.
        let mut header = Vec::new();
        for (i, variable) in select.variables.iter().enumerate() {
            if i > 0 {
                header.push(delimiter.byte());
            }
            let name = match delimiter {
                Delimiter::Comma => variable.strip_prefix('?').unwrap_or(variable),
                Delimiter::Tab => variable.as_str(),
            };
            header.extend_from_slice(name.as_bytes());
        }
        header.push(b'\n');

        DelimitedStream {
            index,
            result,
            columns,
            header: Some(header),
            rows,
            delimiter,
            cancellation,
            failed: false,
        }
    }

    fn row_bytes(&self, row: usize) -> Vec<u8> {
        let table = self.result.id_table();
        let local_vocab = self.result.local_vocab();
        let mut out = Vec::new();
        for (j, column) in self.columns.iter().enumerate() {
            if let Some(column) = column {
                let id = table.at(row, column.column);
                let resolved = match self.delimiter {
                    Delimiter::Comma => id_to_string_and_type(
                        self.index,
                        id,
                        local_vocab,
                        ResolveFlags {
                            remove_quotes_and_angle_brackets: true,
                            only_literals: false,
                        },
                        escape_for_csv,
                    ),
                    Delimiter::Tab => id_to_string_and_type(
                        self.index,
                        id,
                        local_vocab,
                        ResolveFlags::default(),
                        escape_for_tsv,
                    ),
                };
                if let Some((value, _)) = resolved {
                    out.extend_from_slice(value.as_bytes());
                }
            }
            out.push(if j + 1 < self.columns.len() {
                self.delimiter.byte()
            } else {
                b'\n'
            });
        }
        out
    }
}

impl Iterator for DelimitedStream<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(header) = self.header.take() {
            return Some(Ok(header));
        }
        let row = self.rows.next()?;
        if let Err(cancelled) = self.cancellation.check(STREAM_EXPORT_OP) {
            self.failed = true;
            return Some(Err(cancelled.into()));
        }
        Some(Ok(self.row_bytes(row)))
    }
}

/// Streaming CSV/TSV export of the triples a CONSTRUCT query generates:
/// one escaped triple per line, no header.
#[derive(Debug)]
pub struct ConstructDelimitedStream<'a> {
    triples: ConstructTriples<'a>,
    delimiter: Delimiter,
}

impl<'a> ConstructDelimitedStream<'a> {
    pub(crate) fn new(
        query: &'a ParsedQuery,
        tree: &'a QueryExecutionTree,
        index: &'a Index,
        result: SharedResult,
        delimiter: Delimiter,
        cancellation: CancellationHandle,
    ) -> ConstructDelimitedStream<'a> {
        let templates = query
            .construct_clause()
            .map(|clause| clause.triples.as_slice())
            .unwrap_or_default();
        let rows = row_range(&query.limit_offset, &result);
        ConstructDelimitedStream {
            triples: ConstructTriples::new(
                templates,
                tree.variable_columns(),
                index,
                result,
                rows,
                cancellation,
                STREAM_EXPORT_OP,
            ),
            delimiter,
        }
    }
}

impl Iterator for ConstructDelimitedStream<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let triple = match self.triples.next()? {
            Ok(triple) => triple,
            Err(err) => return Some(Err(err)),
        };
        let mut out = Vec::new();
        for (i, component) in triple.iter().enumerate() {
            if i > 0 {
                out.push(self.delimiter.byte());
            }
            out.extend_from_slice(self.delimiter.escape(component).as_bytes());
        }
        out.push(b'\n');
        Some(Ok(out))
    }
}
