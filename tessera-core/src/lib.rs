//! # Tessera Core
//!
//! Core value and table types for the tessera query engine.
//!
//! This crate provides:
//! - [`Id`]: packed, tagged 64-bit identifiers for RDF terms
//! - [`IdTable`]: column-major identifier tables (operator results)
//! - [`Vocabulary`] / [`LocalVocab`]: the two-level term dictionaries
//! - [`Index`]: the read-only facade the planner and exporter consume
//! - [`id_to_string_and_type`]: identifier resolution to lexical forms
//! - [`LimitOffset`]: row-range clamping
//! - [`CancellationHandle`]: cooperative cancellation at suspension points
//!
//! The global index and its vocabularies are process-lifetime read-only
//! singletons; results and local vocabularies are immutable once produced.
//! Nothing here takes a lock.

pub mod cancel;
pub mod datatype;
pub mod id;
pub mod id_table;
pub mod index;
pub mod limit;
pub mod local_vocab;
pub mod resolve;
pub mod result;
pub mod vocabulary;

pub use cancel::{CancellationHandle, CancelledError};
pub use datatype::Datatype;
pub use id::{Id, ID_SIZE};
pub use id_table::IdTable;
pub use index::Index;
pub use limit::LimitOffset;
pub use local_vocab::LocalVocab;
pub use resolve::{
    id_to_string_and_type, ResolveFlags, StringAndType, XSD_BOOLEAN_TYPE, XSD_DATE_TYPE,
    XSD_DECIMAL_TYPE, XSD_INT_TYPE,
};
pub use result::{QueryResult, SharedResult};
pub use vocabulary::{LiteralOrIri, TextVocabulary, Vocabulary};
