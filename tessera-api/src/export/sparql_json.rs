//! SPARQL 1.1 Query Results JSON format.
//!
//! ```json
//! {
//!   "head": {"vars": ["x", "name"]},
//!   "results": {"bindings": [{
//!     "x": {"value": "http://example.org/alice", "type": "uri"},
//!     "name": {"value": "Alice", "type": "literal"}
//!   }]}
//! }
//! ```
//!
//! Variable names drop the leading `?`. Unresolved bindings are omitted
//! from their row object. The streaming variant emits the document
//! prefix, the `,`-separated binding objects, then the suffix; the comma
//! placement keys on the underlying row index, not the emission count.

use super::{
    row_range, selected_variable_columns, ColumnIndexAndVariable, JSON_EXPORT_OP,
    STREAM_EXPORT_OP,
};
use crate::error::Result;
use serde_json::{json, Value as JsonValue};
use std::ops::Range;
use tessera_core::{
    id_to_string_and_type, CancellationHandle, Index, LimitOffset, ResolveFlags, SharedResult,
};
use tessera_query::{QueryExecutionTree, SelectClause};
use tracing::warn;

/// Decode a resolved string into a SPARQL JSON binding object.
///
/// A datatype IRI from the resolver wins outright; otherwise the string's
/// own shape decides: `<...>` is a uri, `_:` a bnode, a quoted form a
/// literal with optional `@lang` / `^^<datatype>` suffix, and anything
/// without quotes a plain literal (the text-record case).
pub(crate) fn string_and_type_to_binding(entity: &str, xsd_type: Option<&str>) -> JsonValue {
    if let Some(datatype) = xsd_type {
        return json!({"value": entity, "type": "literal", "datatype": datatype});
    }
    if let Some(stripped) = entity.strip_prefix('<') {
        let value = stripped.strip_suffix('>').unwrap_or(stripped);
        return json!({"value": value, "type": "uri"});
    }
    if let Some(stripped) = entity.strip_prefix("_:") {
        return json!({"value": stripped, "type": "bnode"});
    }
    match entity.rfind('"') {
        None | Some(0) => json!({"value": entity, "type": "literal"}),
        Some(quote_pos) => {
            let value = &entity[1..quote_pos];
            let suffix = &entity[quote_pos + 1..];
            if let Some(lang) = suffix.strip_prefix('@') {
                json!({"value": value, "type": "literal", "xml:lang": lang})
            } else if let Some(datatype) = suffix.strip_prefix("^^") {
                let datatype = datatype
                    .strip_prefix('<')
                    .and_then(|d| d.strip_suffix('>'))
                    .unwrap_or(datatype);
                json!({"value": value, "type": "literal", "datatype": datatype})
            } else {
                json!({"value": value, "type": "literal"})
            }
        }
    }
}

/// Variable names without the leading `?`, for the `head`.
fn head_vars(select: &SelectClause) -> Vec<String> {
    select
        .variables
        .iter()
        .map(|v| v.strip_prefix('?').unwrap_or(v).to_string())
        .collect()
}

/// One row's binding object over the bound selected columns.
fn row_binding(
    index: &Index,
    result: &tessera_core::QueryResult,
    columns: &[ColumnIndexAndVariable],
    row: usize,
) -> JsonValue {
    let mut binding = serde_json::Map::new();
    for column in columns {
        let id = result.id_table().at(row, column.column);
        let Some((value, xsd_type)) = id_to_string_and_type(
            index,
            id,
            result.local_vocab(),
            ResolveFlags::default(),
            |s| s.to_string(),
        ) else {
            continue;
        };
        binding.insert(
            column.variable.clone(),
            string_and_type_to_binding(&value, xsd_type),
        );
    }
    JsonValue::Object(binding)
}

/// Compute the full SPARQL JSON document.
pub fn select_query_result_to_sparql_json(
    select: &SelectClause,
    tree: &QueryExecutionTree,
    index: &Index,
    result: SharedResult,
    limit_offset: &LimitOffset,
    cancellation: &CancellationHandle,
) -> Result<JsonValue> {
    let vars = head_vars(select);
    let columns: Vec<ColumnIndexAndVariable> = selected_variable_columns(select, tree, false)
        .into_iter()
        .flatten()
        .collect();

    if columns.is_empty() {
        warn!("exporting a query where none of the selected variables is bound");
        return Ok(json!({"head": {"vars": vars}, "results": {"bindings": []}}));
    }

    let mut bindings = Vec::new();
    for row in row_range(limit_offset, &result) {
        cancellation.check(JSON_EXPORT_OP)?;
        bindings.push(row_binding(index, &result, &columns, row));
    }
    Ok(json!({"head": {"vars": vars}, "results": {"bindings": bindings}}))
}

#[derive(Debug)]
enum State {
    Prefix,
    Rows,
    Suffix,
    Done,
}

/// Streaming SPARQL JSON export.
#[derive(Debug)]
pub struct SparqlJsonStream<'a> {
    index: &'a Index,
    result: SharedResult,
    vars: Vec<String>,
    columns: Vec<ColumnIndexAndVariable>,
    rows: Range<usize>,
    state: State,
    cancellation: CancellationHandle,
}

impl<'a> SparqlJsonStream<'a> {
    pub(crate) fn new(
        select: &SelectClause,
        tree: &QueryExecutionTree,
        index: &'a Index,
        result: SharedResult,
        limit_offset: &LimitOffset,
        cancellation: CancellationHandle,
    ) -> SparqlJsonStream<'a> {
        let rows = row_range(limit_offset, &result);
        SparqlJsonStream {
            index,
            result,
            vars: head_vars(select),
            columns: selected_variable_columns(select, tree, false)
                .into_iter()
                .flatten()
                .collect(),
            rows,
            state: State::Prefix,
            cancellation,
        }
    }
}

impl Iterator for SparqlJsonStream<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Prefix => {
                let prefix = format!(
                    "{{\"head\":{{\"vars\":{}}},\"results\":{{\"bindings\":[",
                    JsonValue::from(self.vars.clone())
                );
                self.state = if self.columns.is_empty() {
                    State::Suffix
                } else {
                    State::Rows
                };
                Some(Ok(prefix.into_bytes()))
            }
            State::Rows => match self.rows.next() {
                Some(row) => {
                    if let Err(cancelled) = self.cancellation.check(STREAM_EXPORT_OP) {
                        self.state = State::Done;
                        return Some(Err(cancelled.into()));
                    }
                    let binding = row_binding(self.index, &self.result, &self.columns, row);
                    // The separating comma keys on the underlying row
                    // index: row 0 gets none, everything else does.
                    let chunk = format!("{}{}", if row == 0 { "" } else { "," }, binding);
                    Some(Ok(chunk.into_bytes()))
                }
                None => {
                    self.state = State::Done;
                    Some(Ok(b"]}}".to_vec()))
                }
            },
            State::Suffix => {
                self.state = State::Done;
                Some(Ok(b"]}}".to_vec()))
            }
            State::Done => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_from_resolver_datatype() {
        assert_eq!(
            string_and_type_to_binding("42", Some("http://www.w3.org/2001/XMLSchema#int")),
            json!({"value": "42", "type": "literal", "datatype": "http://www.w3.org/2001/XMLSchema#int"})
        );
    }

    #[test]
    fn test_binding_uri_and_bnode() {
        assert_eq!(
            string_and_type_to_binding("<http://x>", None),
            json!({"value": "http://x", "type": "uri"})
        );
        assert_eq!(
            string_and_type_to_binding("_:b1", None),
            json!({"value": "b1", "type": "bnode"})
        );
    }

    #[test]
    fn test_binding_literal_variants() {
        assert_eq!(
            string_and_type_to_binding("\"Alice\"", None),
            json!({"value": "Alice", "type": "literal"})
        );
        assert_eq!(
            string_and_type_to_binding("\"bonjour\"@fr", None),
            json!({"value": "bonjour", "type": "literal", "xml:lang": "fr"})
        );
        assert_eq!(
            string_and_type_to_binding("\"42\"^^<http://x/int>", None),
            json!({"value": "42", "type": "literal", "datatype": "http://x/int"})
        );
    }

    #[test]
    fn test_binding_bare_string_is_plain_literal() {
        // Text records are not surrounded by quotes.
        assert_eq!(
            string_and_type_to_binding("an excerpt", None),
            json!({"value": "an excerpt", "type": "literal"})
        );
    }
}
