//! # Tessera Query
//!
//! The query layer of the tessera engine: the frozen parser output, the
//! triple-pattern connection graph, operator-tree metadata, and the
//! cost-based dynamic-programming join planner.
//!
//! Flow: a [`ParsedQuery`] becomes a [`TripleGraph`], text cliques are
//! collapsed, the [`QueryPlanner`] enumerates connected join plans in a DP
//! table and returns the cheapest [`QueryExecutionTree`]. Planning is
//! synchronous and single-threaded per query.

pub mod error;
pub mod exec_tree;
pub mod parsed;
pub mod planner;
pub mod triple_graph;

pub use error::{QueryError, Result};
pub use exec_tree::{
    join_variable_columns, score_variable, IndexScan, Operation, OperationKind,
    QueryExecutionTree, ScanKind,
};
pub use parsed::{
    is_variable, is_word_sequence, ConstructClause, ConstructComponent, ConstructContext,
    ConstructTemplate, FilterKind, OrderKey, ParsedQuery, PositionInTriple, QueryClause,
    SelectClause, SparqlFilter, SparqlTriple, HAS_CONTEXT_RELATION, IN_CONTEXT_RELATION,
};
pub use planner::{QueryPlanner, SubtreePlan};
pub use triple_graph::{TripleGraph, TripleGraphNode};
