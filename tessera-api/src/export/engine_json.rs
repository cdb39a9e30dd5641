//! The tool-specific JSON result document.
//!
//! A single JSON object carrying the query, status, warnings, the selected
//! variables (or the fixed triple for CONSTRUCT), operator-tree statistics,
//! the result rows, the result size, and timings. The streaming variant
//! emits the document prefix, then `,`-separated row dumps, then the
//! suffix, without buffering the full result.

use super::construct::ConstructTriples;
use super::runtime_info::RuntimeInformation;
use super::{
    collect_warnings, row_range, selected_variable_columns, ColumnIndexAndVariable,
    JSON_EXPORT_OP, STREAM_EXPORT_OP,
};
use crate::error::Result;
use serde_json::{json, Value as JsonValue};
use std::ops::Range;
use std::time::Instant;
use tessera_core::{
    id_to_string_and_type, CancellationHandle, Index, QueryResult, ResolveFlags, SharedResult,
};
use tessera_query::{ParsedQuery, QueryClause, QueryExecutionTree};

/// `selected` field: the projection, or the fixed triple for CONSTRUCT.
fn selected_field(query: &ParsedQuery) -> Vec<String> {
    match &query.clause {
        QueryClause::Select(select) => select.variables.clone(),
        QueryClause::Construct(_) => vec![
            "?subject".to_string(),
            "?predicate".to_string(),
            "?object".to_string(),
        ],
    }
}

/// The document prefix shared by the full and streaming forms.
fn engine_json_prefix(
    query: &ParsedQuery,
    tree: &QueryExecutionTree,
) -> serde_json::Map<String, JsonValue> {
    let runtime = RuntimeInformation::from_tree(tree).with_limit_offset_row(&query.limit_offset);
    let mut prefix = serde_json::Map::new();
    prefix.insert("query".to_string(), json!(query.original));
    prefix.insert("status".to_string(), json!("OK"));
    prefix.insert("warnings".to_string(), json!(collect_warnings(query, tree)));
    prefix.insert("selected".to_string(), json!(selected_field(query)));
    prefix.insert(
        "runtimeInformation".to_string(),
        json!({
            "meta": {},
            "query_execution_tree": runtime,
        }),
    );
    prefix
}

/// One result row as a JSON array: `null` marks unbound cells, values with
/// a datatype render as `"<lexical>"^^<<datatype-iri>>` in a single
/// string, everything else verbatim.
fn row_array(
    index: &Index,
    result: &QueryResult,
    columns: &[Option<ColumnIndexAndVariable>],
    row: usize,
) -> JsonValue {
    let mut out = Vec::with_capacity(columns.len());
    for column in columns {
        let Some(column) = column else {
            out.push(JsonValue::Null);
            continue;
        };
        let id = result.id_table().at(row, column.column);
        match id_to_string_and_type(index, id, result.local_vocab(), ResolveFlags::default(), |s| {
            s.to_string()
        }) {
            None => out.push(JsonValue::Null),
            Some((value, Some(datatype))) => {
                out.push(json!(format!("\"{value}\"^^<{datatype}>")));
            }
            Some((value, None)) => out.push(json!(value)),
        }
    }
    JsonValue::Array(out)
}

fn timings(request_timer: Instant, compute_ms: u128) -> JsonValue {
    json!({
        "total": format!("{}ms", request_timer.elapsed().as_millis()),
        "computeResult": format!("{compute_ms}ms"),
    })
}

/// Compute the full document.
pub fn compute_query_result_as_engine_json(
    query: &ParsedQuery,
    tree: &QueryExecutionTree,
    index: &Index,
    result: SharedResult,
    request_timer: Instant,
    cancellation: &CancellationHandle,
) -> Result<JsonValue> {
    let compute_ms = request_timer.elapsed().as_millis();
    let mut doc = engine_json_prefix(query, tree);

    let res: Vec<JsonValue> = match &query.clause {
        QueryClause::Select(select) => {
            let columns = selected_variable_columns(select, tree, true);
            let mut rows = Vec::new();
            for row in row_range(&query.limit_offset, &result) {
                cancellation.check(JSON_EXPORT_OP)?;
                rows.push(row_array(index, &result, &columns, row));
            }
            rows
        }
        QueryClause::Construct(clause) => {
            let triples = ConstructTriples::new(
                &clause.triples,
                tree.variable_columns(),
                index,
                result.clone(),
                row_range(&query.limit_offset, &result),
                cancellation.clone(),
                JSON_EXPORT_OP,
            );
            let mut rows = Vec::new();
            for triple in triples {
                let [s, p, o] = triple?;
                rows.push(json!([s, p, o]));
            }
            rows
        }
    };

    let resultsize = match &query.clause {
        QueryClause::Select(_) => result.row_count(),
        QueryClause::Construct(_) => res.len(),
    };
    doc.insert("res".to_string(), JsonValue::Array(res));
    doc.insert("resultsize".to_string(), json!(resultsize));
    doc.insert("time".to_string(), timings(request_timer, compute_ms));
    Ok(JsonValue::Object(doc))
}

#[derive(Debug)]
enum RowsSource<'a> {
    Select {
        rows: Range<usize>,
        columns: Vec<Option<ColumnIndexAndVariable>>,
    },
    Construct(ConstructTriples<'a>),
}

#[derive(Debug)]
enum State {
    Prefix,
    Rows,
    Done,
}

/// Outcome of advancing the row source by one step.
enum Step {
    Row(JsonValue),
    Failed(crate::error::ExportError),
    End,
}

/// Streaming variant of the tool-specific JSON document.
#[derive(Debug)]
pub struct EngineJsonStream<'a> {
    index: &'a Index,
    result: SharedResult,
    source: RowsSource<'a>,
    prefix: Option<Vec<u8>>,
    emitted: usize,
    state: State,
    request_timer: Instant,
    compute_ms: u128,
    cancellation: CancellationHandle,
}

impl<'a> EngineJsonStream<'a> {
    pub(crate) fn new(
        query: &'a ParsedQuery,
        tree: &'a QueryExecutionTree,
        index: &'a Index,
        result: SharedResult,
        request_timer: Instant,
        cancellation: CancellationHandle,
    ) -> EngineJsonStream<'a> {
        let compute_ms = request_timer.elapsed().as_millis();
        let rows = row_range(&query.limit_offset, &result);
        let source = match &query.clause {
            QueryClause::Select(select) => RowsSource::Select {
                rows,
                columns: selected_variable_columns(select, tree, true),
            },
            QueryClause::Construct(clause) => RowsSource::Construct(ConstructTriples::new(
                &clause.triples,
                tree.variable_columns(),
                index,
                result.clone(),
                rows,
                cancellation.clone(),
                STREAM_EXPORT_OP,
            )),
        };
        let mut rendered = JsonValue::Object(engine_json_prefix(query, tree)).to_string();
        // Reopen the closed object and start the row array.
        rendered.pop();
        rendered.push_str(",\"res\":[");
        let prefix = rendered.into_bytes();
        EngineJsonStream {
            index,
            result,
            source,
            prefix: Some(prefix),
            emitted: 0,
            state: State::Prefix,
            request_timer,
            compute_ms,
            cancellation,
        }
    }

    fn suffix_bytes(&self) -> Vec<u8> {
        let suffix = json!({
            "resultsize": self.emitted,
            "time": timings(self.request_timer, self.compute_ms),
        })
        .to_string();
        // Splice onto the open row array: "]," plus the suffix object with
        // its opening brace dropped.
        format!("],{}", &suffix[1..]).into_bytes()
    }

    fn row_chunk(&mut self, row: JsonValue) -> Vec<u8> {
        let chunk = format!(
            "{}{}",
            if self.emitted > 0 { "," } else { "" },
            row
        );
        self.emitted += 1;
        chunk.into_bytes()
    }
}

impl Iterator for EngineJsonStream<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Prefix => {
                self.state = State::Rows;
                self.prefix.take().map(Ok)
            }
            State::Rows => {
                let index = self.index;
                let step = match &mut self.source {
                    RowsSource::Select { rows, columns } => match rows.next() {
                        Some(row) => match self.cancellation.check(STREAM_EXPORT_OP) {
                            Ok(()) => Step::Row(row_array(index, &self.result, columns, row)),
                            Err(cancelled) => Step::Failed(cancelled.into()),
                        },
                        None => Step::End,
                    },
                    RowsSource::Construct(triples) => match triples.next() {
                        Some(Ok([s, p, o])) => Step::Row(json!([s, p, o])),
                        Some(Err(err)) => Step::Failed(err),
                        None => Step::End,
                    },
                };
                match step {
                    Step::Row(row) => Some(Ok(self.row_chunk(row))),
                    Step::Failed(err) => {
                        self.state = State::Done;
                        Some(Err(err))
                    }
                    Step::End => {
                        self.state = State::Done;
                        Some(Ok(self.suffix_bytes()))
                    }
                }
            }
            State::Done => None,
        }
    }
}
