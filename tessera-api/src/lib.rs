//! # Tessera API
//!
//! The output layer of the tessera query engine: identifier resolution
//! glue, RDF-aware escaping, and the streaming result exporter.
//!
//! The exporter is single-threaded and cooperative: each format is a
//! pull-based state machine yielding byte chunks, with a cancellation
//! check at every row boundary. Five wire formats are supported (CSV,
//! TSV, binary, SPARQL-JSON, SPARQL-XML) plus Turtle for CONSTRUCT and
//! the tool-specific JSON document.

pub mod error;
pub mod escape;
pub mod export;

pub use error::{ExportError, Result};
pub use export::runtime_info::RuntimeInformation;
pub use export::{
    compute_result_as_json, export_as_stream, selected_variable_columns, ByteStream,
    ColumnIndexAndVariable, MediaType,
};
