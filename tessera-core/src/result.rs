//! Materialised query results.

use crate::id_table::IdTable;
use crate::local_vocab::LocalVocab;
use std::sync::Arc;

/// A materialised result: an identifier table, the local vocabulary its
/// identifiers may reference, and the column (if any) the table is sorted
/// on. Immutable once produced; shared by handle.
#[derive(Clone, Debug, Default)]
pub struct QueryResult {
    id_table: IdTable,
    local_vocab: LocalVocab,
    sorted_on: Option<usize>,
}

/// Cheap-to-clone shared handle to a result.
pub type SharedResult = Arc<QueryResult>;

impl QueryResult {
    pub fn new(id_table: IdTable, local_vocab: LocalVocab, sorted_on: Option<usize>) -> QueryResult {
        QueryResult {
            id_table,
            local_vocab,
            sorted_on,
        }
    }

    #[inline]
    pub fn id_table(&self) -> &IdTable {
        &self.id_table
    }

    #[inline]
    pub fn local_vocab(&self) -> &LocalVocab {
        &self.local_vocab
    }

    #[inline]
    pub fn sorted_on(&self) -> Option<usize> {
        self.sorted_on
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.id_table.num_rows()
    }
}
