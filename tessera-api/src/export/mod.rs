//! Streaming result export.
//!
//! One state machine per wire format, all sharing the same pipeline:
//! compute the exported row range from LIMIT/OFFSET, iterate rows, resolve
//! each selected identifier, emit bytes. The streams are pull-based
//! iterators over byte chunks; every row boundary polls the cancellation
//! handle. The format is picked at runtime via [`MediaType`], with a
//! single compiled path per format.

pub mod binary;
pub mod construct;
pub mod delimited;
pub mod engine_json;
pub mod runtime_info;
pub mod sparql_json;
pub mod sparql_xml;
pub mod turtle;

use crate::error::{ExportError, Result};
use std::ops::Range;
use std::time::Instant;
use tessera_core::{CancellationHandle, Index, LimitOffset, QueryResult, SharedResult};
use tessera_query::{
    ConstructComponent, ParsedQuery, QueryClause, QueryExecutionTree, SelectClause,
};
use tracing::debug;

/// Operation tag used by the streaming exporters.
pub(crate) const STREAM_EXPORT_OP: &str = "Stream query export";

/// Operation tag used by the JSON document builders.
pub(crate) const JSON_EXPORT_OP: &str = "Query export";

/// The supported output media types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaType {
    Csv,
    Tsv,
    OctetStream,
    SparqlJson,
    SparqlXml,
    Turtle,
    /// The tool-specific JSON document.
    EngineJson,
}

impl MediaType {
    pub fn from_content_type(content_type: &str) -> Option<MediaType> {
        match content_type {
            "text/csv" => Some(MediaType::Csv),
            "text/tab-separated-values" => Some(MediaType::Tsv),
            "application/octet-stream" => Some(MediaType::OctetStream),
            "application/sparql-results+json" => Some(MediaType::SparqlJson),
            "application/sparql-results+xml" => Some(MediaType::SparqlXml),
            "text/turtle" => Some(MediaType::Turtle),
            "application/tessera-results+json" => Some(MediaType::EngineJson),
            _ => None,
        }
    }

    pub fn as_content_type(self) -> &'static str {
        match self {
            MediaType::Csv => "text/csv",
            MediaType::Tsv => "text/tab-separated-values",
            MediaType::OctetStream => "application/octet-stream",
            MediaType::SparqlJson => "application/sparql-results+json",
            MediaType::SparqlXml => "application/sparql-results+xml",
            MediaType::Turtle => "text/turtle",
            MediaType::EngineJson => "application/tessera-results+json",
        }
    }
}

/// The row indices to export, with LIMIT and OFFSET clamped to the actual
/// table size.
pub(crate) fn row_range(limit_offset: &LimitOffset, result: &QueryResult) -> Range<usize> {
    let n = result.row_count();
    limit_offset.actual_offset(n)..limit_offset.upper_bound(n)
}

/// A selected variable resolved to its output column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnIndexAndVariable {
    pub column: usize,
    pub variable: String,
}

/// Map the selected variables onto the tree's output columns, `None` for
/// variables the tree does not bind. With `keep_question_mark` unset the
/// leading `?` is stripped from the reported variable names.
pub fn selected_variable_columns(
    select: &SelectClause,
    tree: &QueryExecutionTree,
    keep_question_mark: bool,
) -> Vec<Option<ColumnIndexAndVariable>> {
    select
        .variables
        .iter()
        .map(|variable| {
            tree.variable_column(variable).map(|column| {
                let variable = if keep_question_mark {
                    variable.clone()
                } else {
                    variable.strip_prefix('?').unwrap_or(variable).to_string()
                };
                ColumnIndexAndVariable { column, variable }
            })
        })
        .collect()
}

/// Guard the caller's contract that `result` was produced for `tree`:
/// every column the export will read must exist in the table.
fn check_result_columns(
    query: &ParsedQuery,
    tree: &QueryExecutionTree,
    result: &QueryResult,
) -> Result<()> {
    let width = result.id_table().num_cols();
    let check = |variable: &str, column: usize| {
        if column >= width {
            return Err(ExportError::MissingColumn(format!(
                "variable {variable} maps to column {column}, \
                 but the result table has {width} columns"
            )));
        }
        Ok(())
    };
    match &query.clause {
        QueryClause::Select(select) => {
            for variable in &select.variables {
                if let Some(column) = tree.variable_column(variable) {
                    check(variable, column)?;
                }
            }
        }
        QueryClause::Construct(clause) => {
            for template in &clause.triples {
                for component in template {
                    if let ConstructComponent::Variable(name) = component {
                        if let Some(column) = tree.variable_column(name) {
                            check(name, column)?;
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

/// Warnings surfaced into the tool-specific JSON output.
pub(crate) fn collect_warnings(query: &ParsedQuery, tree: &QueryExecutionTree) -> Vec<String> {
    let Some(select) = query.select_clause() else {
        return Vec::new();
    };
    select
        .variables
        .iter()
        .filter(|variable| !tree.var_covered(variable))
        .map(|variable| format!("Selected variable {variable} is not bound in the query"))
        .collect()
}

/// A lazy, restart-unsafe sequence of byte chunks in one of the streamed
/// formats. Cooperative only: the producer yields after each row and the
/// consumer drives it; no chunk is ever emitted twice.
#[derive(Debug)]
pub enum ByteStream<'a> {
    Delimited(delimited::DelimitedStream<'a>),
    ConstructDelimited(delimited::ConstructDelimitedStream<'a>),
    Binary(binary::BinaryStream),
    SparqlJson(sparql_json::SparqlJsonStream<'a>),
    SparqlXml(sparql_xml::SparqlXmlStream<'a>),
    Turtle(turtle::TurtleStream<'a>),
    EngineJson(engine_json::EngineJsonStream<'a>),
}

impl Iterator for ByteStream<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ByteStream::Delimited(stream) => stream.next(),
            ByteStream::ConstructDelimited(stream) => stream.next(),
            ByteStream::Binary(stream) => stream.next(),
            ByteStream::SparqlJson(stream) => stream.next(),
            ByteStream::SparqlXml(stream) => stream.next(),
            ByteStream::Turtle(stream) => stream.next(),
            ByteStream::EngineJson(stream) => stream.next(),
        }
    }
}

/// Build the byte stream for a query result in the requested format.
///
/// Unsupported format/query combinations are refused up front; everything
/// downstream is lazy.
pub fn export_as_stream<'a>(
    query: &'a ParsedQuery,
    tree: &'a QueryExecutionTree,
    index: &'a Index,
    result: SharedResult,
    media_type: MediaType,
    request_timer: Instant,
    cancellation: CancellationHandle,
) -> Result<ByteStream<'a>> {
    debug!(rows = result.row_count(), ?media_type, "exporting query result");
    check_result_columns(query, tree, &result)?;
    match media_type {
        MediaType::Csv | MediaType::Tsv => {
            let delimiter = if media_type == MediaType::Csv {
                delimited::Delimiter::Comma
            } else {
                delimited::Delimiter::Tab
            };
            match query.select_clause() {
                Some(select) => Ok(ByteStream::Delimited(delimited::DelimitedStream::new(
                    select,
                    tree,
                    index,
                    result,
                    &query.limit_offset,
                    delimiter,
                    cancellation,
                ))),
                None => Ok(ByteStream::ConstructDelimited(
                    delimited::ConstructDelimitedStream::new(
                        query,
                        tree,
                        index,
                        result,
                        delimiter,
                        cancellation,
                    ),
                )),
            }
        }
        MediaType::OctetStream => match query.select_clause() {
            Some(select) => Ok(ByteStream::Binary(binary::BinaryStream::new(
                select,
                tree,
                result,
                &query.limit_offset,
                cancellation,
            ))),
            None => Err(ExportError::Unsupported(
                "Binary export is not supported for CONSTRUCT queries".to_string(),
            )),
        },
        MediaType::SparqlJson => match query.select_clause() {
            Some(select) => Ok(ByteStream::SparqlJson(sparql_json::SparqlJsonStream::new(
                select,
                tree,
                index,
                result,
                &query.limit_offset,
                cancellation,
            ))),
            None => Err(ExportError::Unsupported(
                "SPARQL-compliant JSON format is only supported for SELECT queries".to_string(),
            )),
        },
        MediaType::SparqlXml => match query.select_clause() {
            Some(select) => Ok(ByteStream::SparqlXml(sparql_xml::SparqlXmlStream::new(
                select,
                tree,
                index,
                result,
                &query.limit_offset,
                cancellation,
            ))),
            None => Err(ExportError::Unsupported(
                "XML export is currently not supported for CONSTRUCT queries".to_string(),
            )),
        },
        MediaType::Turtle => match query.construct_clause() {
            Some(_) => Ok(ByteStream::Turtle(turtle::TurtleStream::new(
                query,
                tree,
                index,
                result,
                cancellation,
            ))),
            None => Err(ExportError::Unsupported(
                "Turtle export is only supported for CONSTRUCT queries".to_string(),
            )),
        },
        MediaType::EngineJson => Ok(ByteStream::EngineJson(engine_json::EngineJsonStream::new(
            query,
            tree,
            index,
            result,
            request_timer,
            cancellation,
        ))),
    }
}

/// Compute one of the two JSON document forms (SPARQL-JSON or the
/// tool-specific document) in full.
pub fn compute_result_as_json(
    query: &ParsedQuery,
    tree: &QueryExecutionTree,
    index: &Index,
    result: SharedResult,
    media_type: MediaType,
    request_timer: Instant,
    cancellation: &CancellationHandle,
) -> Result<serde_json::Value> {
    check_result_columns(query, tree, &result)?;
    match media_type {
        MediaType::EngineJson => engine_json::compute_query_result_as_engine_json(
            query,
            tree,
            index,
            result,
            request_timer,
            cancellation,
        ),
        MediaType::SparqlJson => {
            let Some(select) = query.select_clause() else {
                return Err(ExportError::Unsupported(
                    "SPARQL-compliant JSON format is only supported for SELECT queries".to_string(),
                ));
            };
            sparql_json::select_query_result_to_sparql_json(
                select,
                tree,
                index,
                result,
                &query.limit_offset,
                cancellation,
            )
        }
        other => Err(ExportError::Unsupported(format!(
            "{} cannot be computed as a JSON document",
            other.as_content_type()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_round_trip() {
        for media in [
            MediaType::Csv,
            MediaType::Tsv,
            MediaType::OctetStream,
            MediaType::SparqlJson,
            MediaType::SparqlXml,
            MediaType::Turtle,
            MediaType::EngineJson,
        ] {
            assert_eq!(MediaType::from_content_type(media.as_content_type()), Some(media));
        }
        assert_eq!(MediaType::from_content_type("text/html"), None);
    }

    #[test]
    fn test_row_range_clamps() {
        let mut table = tessera_core::IdTable::new(1);
        for i in 0..5 {
            table.push_row(&[tessera_core::Id::from_int(i)]);
        }
        let result = QueryResult::new(table, Default::default(), None);
        assert_eq!(row_range(&LimitOffset::new(Some(2), 2), &result), 2..4);
        assert_eq!(row_range(&LimitOffset::new(Some(100), 4), &result), 4..5);
        assert_eq!(row_range(&LimitOffset::default(), &result), 0..5);
    }
}
