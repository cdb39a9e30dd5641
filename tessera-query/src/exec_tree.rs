//! Operator-tree metadata.
//!
//! A [`QueryExecutionTree`] is what the planner builds and what export
//! consumes: a tagged operation over a closed set, a variable-to-column
//! map, the context variables flowing through it, and a text limit. The
//! planner only ever observes cost, size, the sort column, the column map,
//! and the operation kind; physical execution lives behind the scan and
//! text operators and is not represented here.

use crate::parsed::FilterKind;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Column name of the text score bound to a context variable.
pub fn score_variable(cvar: &str) -> String {
    format!("SCORE({cvar})")
}

/// The four scan shapes the seeds use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanKind {
    /// PSO permutation, subject additionally bound: one output column
    /// holding objects.
    PsoBoundS,
    /// POS permutation, object additionally bound: one output column
    /// holding subjects.
    PosBoundO,
    /// PSO permutation, free subject: output columns (subject, object).
    PsoFreeS,
    /// POS permutation, free object: output columns (object, subject).
    PosFreeO,
}

/// An index scan leaf.
#[derive(Clone, Debug)]
pub struct IndexScan {
    pub kind: ScanKind,
    pub subject: Option<String>,
    pub predicate: String,
    pub object: Option<String>,
    pub size_estimate: usize,
}

/// The closed set of operations a tree node can carry.
#[derive(Clone, Debug)]
pub enum Operation {
    Scan(IndexScan),
    Sort {
        child: Arc<QueryExecutionTree>,
        column: usize,
    },
    OrderBy {
        child: Arc<QueryExecutionTree>,
        /// `(column, descending)` per key.
        keys: Vec<(usize, bool)>,
    },
    Join {
        left: Arc<QueryExecutionTree>,
        right: Arc<QueryExecutionTree>,
        left_col: usize,
        right_col: usize,
    },
    Filter {
        child: Arc<QueryExecutionTree>,
        kind: FilterKind,
        lhs_col: usize,
        rhs_col: usize,
    },
    Distinct {
        child: Arc<QueryExecutionTree>,
        keep_columns: Vec<usize>,
    },
    /// Text leaf: contexts and entities co-occurring with the word part.
    TextWithoutFilter {
        words: String,
        n_free_vars: usize,
        size_estimate: usize,
    },
    /// Text operation fused with an entity filter subtree.
    TextWithFilter {
        words: String,
        n_free_vars: usize,
        filter: Arc<QueryExecutionTree>,
        filter_column: usize,
        size_estimate: usize,
    },
    /// Entity-centric text operation (legacy seeding path).
    TextForEntities {
        words: String,
        n_free_vars: usize,
        size_estimate: usize,
    },
    /// Pure text query: (context, score) pairs only.
    TextForContexts {
        words: String,
        size_estimate: usize,
    },
}

/// The kind tag of an [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Scan,
    Sort,
    OrderBy,
    Join,
    Filter,
    Distinct,
    TextWithoutFilter,
    TextWithFilter,
    TextForEntities,
    TextForContexts,
}

impl OperationKind {
    pub fn name(self) -> &'static str {
        match self {
            OperationKind::Scan => "SCAN",
            OperationKind::Sort => "SORT",
            OperationKind::OrderBy => "ORDER_BY",
            OperationKind::Join => "JOIN",
            OperationKind::Filter => "FILTER",
            OperationKind::Distinct => "DISTINCT",
            OperationKind::TextWithoutFilter => "TEXT_WITHOUT_FILTER",
            OperationKind::TextWithFilter => "TEXT_WITH_FILTER",
            OperationKind::TextForEntities => "TEXT_FOR_ENTITIES",
            OperationKind::TextForContexts => "TEXT_FOR_CONTEXTS",
        }
    }
}

/// Sort cost term: `n * ceil(log2(n))`-ish, integer-only.
fn sort_cost(n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    n * (usize::BITS - n.leading_zeros()) as usize
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Scan(_) => OperationKind::Scan,
            Operation::Sort { .. } => OperationKind::Sort,
            Operation::OrderBy { .. } => OperationKind::OrderBy,
            Operation::Join { .. } => OperationKind::Join,
            Operation::Filter { .. } => OperationKind::Filter,
            Operation::Distinct { .. } => OperationKind::Distinct,
            Operation::TextWithoutFilter { .. } => OperationKind::TextWithoutFilter,
            Operation::TextWithFilter { .. } => OperationKind::TextWithFilter,
            Operation::TextForEntities { .. } => OperationKind::TextForEntities,
            Operation::TextForContexts { .. } => OperationKind::TextForContexts,
        }
    }

    /// Direct children, for runtime-information traversal.
    pub fn children(&self) -> Vec<&Arc<QueryExecutionTree>> {
        match self {
            Operation::Scan(_)
            | Operation::TextWithoutFilter { .. }
            | Operation::TextForEntities { .. }
            | Operation::TextForContexts { .. } => Vec::new(),
            Operation::Sort { child, .. }
            | Operation::OrderBy { child, .. }
            | Operation::Filter { child, .. }
            | Operation::Distinct { child, .. } => vec![child],
            Operation::Join { left, right, .. } => vec![left, right],
            Operation::TextWithFilter { filter, .. } => vec![filter],
        }
    }

    fn size_estimate(&self) -> usize {
        match self {
            Operation::Scan(scan) => scan.size_estimate,
            Operation::Sort { child, .. }
            | Operation::OrderBy { child, .. }
            | Operation::Distinct { child, .. } => child.size_estimate(),
            Operation::Join { left, right, .. } => {
                let a = left.size_estimate();
                let b = right.size_estimate();
                a.saturating_mul(b) / a.max(b).max(1)
            }
            Operation::Filter { child, .. } => child.size_estimate() / 2,
            Operation::TextWithoutFilter { size_estimate, .. }
            | Operation::TextForEntities { size_estimate, .. }
            | Operation::TextForContexts { size_estimate, .. } => *size_estimate,
            Operation::TextWithFilter {
                filter,
                size_estimate,
                ..
            } => (*size_estimate).min(filter.size_estimate()),
        }
    }

    fn cost_estimate(&self) -> usize {
        match self {
            Operation::Scan(scan) => scan.size_estimate,
            Operation::Sort { child, .. } | Operation::OrderBy { child, .. } => {
                child.cost_estimate() + sort_cost(child.size_estimate())
            }
            Operation::Join { left, right, .. } => {
                left.cost_estimate() + right.cost_estimate() + self.size_estimate()
            }
            Operation::Filter { child, .. } | Operation::Distinct { child, .. } => {
                child.cost_estimate() + child.size_estimate()
            }
            Operation::TextWithoutFilter { size_estimate, .. }
            | Operation::TextForEntities { size_estimate, .. }
            | Operation::TextForContexts { size_estimate, .. } => *size_estimate,
            Operation::TextWithFilter {
                filter,
                size_estimate,
                ..
            } => filter.cost_estimate() + size_estimate + self.size_estimate(),
        }
    }

    fn result_sorted_on(&self) -> Option<usize> {
        match self {
            Operation::Scan(_) => Some(0),
            Operation::Sort { column, .. } => Some(*column),
            Operation::Join { left_col, .. } => Some(*left_col),
            Operation::Filter { child, .. } | Operation::Distinct { child, .. } => {
                child.result_sorted_on()
            }
            Operation::OrderBy { .. }
            | Operation::TextWithoutFilter { .. }
            | Operation::TextWithFilter { .. }
            | Operation::TextForEntities { .. }
            | Operation::TextForContexts { .. } => None,
        }
    }
}

/// An executable operator tree plus everything a parent operator can
/// observe about its output.
#[derive(Clone, Debug)]
pub struct QueryExecutionTree {
    operation: Operation,
    variable_columns: FxHashMap<String, usize>,
    context_vars: BTreeSet<String>,
    text_limit: u64,
}

impl QueryExecutionTree {
    pub fn new(operation: Operation) -> QueryExecutionTree {
        QueryExecutionTree {
            operation,
            variable_columns: FxHashMap::default(),
            context_vars: BTreeSet::new(),
            text_limit: 1,
        }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn set_variable_column(&mut self, variable: impl Into<String>, column: usize) {
        self.variable_columns.insert(variable.into(), column);
    }

    pub fn set_variable_columns(&mut self, map: FxHashMap<String, usize>) {
        self.variable_columns = map;
    }

    pub fn variable_columns(&self) -> &FxHashMap<String, usize> {
        &self.variable_columns
    }

    pub fn variable_column(&self, variable: &str) -> Option<usize> {
        self.variable_columns.get(variable).copied()
    }

    pub fn var_covered(&self, variable: &str) -> bool {
        self.variable_columns.contains_key(variable)
    }

    /// The variable mapped to `column`, if any.
    pub fn ordered_variable(&self, column: usize) -> Option<&str> {
        self.variable_columns
            .iter()
            .find(|(_, &col)| col == column)
            .map(|(var, _)| var.as_str())
    }

    pub fn add_context_var(&mut self, variable: impl Into<String>) {
        self.context_vars.insert(variable.into());
    }

    pub fn set_context_vars(&mut self, vars: BTreeSet<String>) {
        self.context_vars = vars;
    }

    pub fn context_vars(&self) -> &BTreeSet<String> {
        &self.context_vars
    }

    pub fn result_width(&self) -> usize {
        self.variable_columns.len()
    }

    pub fn result_sorted_on(&self) -> Option<usize> {
        self.operation.result_sorted_on()
    }

    pub fn size_estimate(&self) -> usize {
        self.operation.size_estimate()
    }

    pub fn cost_estimate(&self) -> usize {
        self.operation.cost_estimate()
    }

    pub fn text_limit(&self) -> u64 {
        self.text_limit
    }

    /// Attach the query's text limit for consumption by the text operators
    /// within.
    pub fn with_text_limit(mut self, limit: u64) -> QueryExecutionTree {
        self.text_limit = limit;
        self
    }
}

/// The output column map of a join: left columns stay, right columns are
/// appended with the (shared) join column removed.
pub fn join_variable_columns(
    left: &QueryExecutionTree,
    right: &QueryExecutionTree,
    right_col: usize,
) -> FxHashMap<String, usize> {
    let left_width = left.result_width();
    let mut map = left.variable_columns().clone();
    for (variable, &col) in right.variable_columns() {
        if map.contains_key(variable) {
            continue;
        }
        let adjusted = if col < right_col { col } else { col - 1 };
        map.insert(variable.clone(), left_width + adjusted);
    }
    map
}
