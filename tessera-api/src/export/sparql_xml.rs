//! SPARQL 1.1 Query Results XML format.
//!
//! ```xml
//! <?xml version="1.0"?>
//! <sparql xmlns="http://www.w3.org/2005/sparql-results#">
//! <head><variable name="x"/></head>
//! <results>
//!   <result><binding name="x"><uri>http://x</uri></binding></result>
//! </results>
//! </sparql>
//! ```
//!
//! Binding contents follow the same decoding rules as the JSON format.
//! Values are XML-escaped, except datatype IRIs already produced by the
//! resolver, which are trusted as pre-escaped.

use super::{row_range, selected_variable_columns, ColumnIndexAndVariable, STREAM_EXPORT_OP};
use crate::error::Result;
use crate::escape::escape_for_xml;
use std::ops::Range;
use tessera_core::{
    id_to_string_and_type, CancellationHandle, Id, Index, LimitOffset, LocalVocab, ResolveFlags,
    SharedResult,
};
use tessera_query::{QueryExecutionTree, SelectClause};

/// Render one identifier as a `<binding>` element. Unresolved identifiers
/// render as the empty string.
fn id_to_xml_binding(variable: &str, id: Id, index: &Index, local_vocab: &LocalVocab) -> String {
    let Some((value, xsd_type)) =
        id_to_string_and_type(index, id, local_vocab, ResolveFlags::default(), |s| {
            s.to_string()
        })
    else {
        return String::new();
    };

    let mut out = format!("\n    <binding name=\"{variable}\">");
    match xsd_type {
        Some(datatype) => {
            // The resolver's datatype IRIs and lexical forms are plain
            // ASCII, trusted as pre-escaped.
            out.push_str(&format!("<literal datatype=\"{datatype}\">{value}</literal>"));
        }
        None => append_decoded_binding(&mut out, &value),
    }
    out.push_str("</binding>");
    out
}

/// Decode an entity string into `<uri>`, `<bnode>`, or `<literal>`
/// content.
fn append_decoded_binding(out: &mut String, entity: &str) {
    if let Some(stripped) = entity.strip_prefix('<') {
        let value = stripped.strip_suffix('>').unwrap_or(stripped);
        out.push_str("<uri>");
        out.push_str(&escape_for_xml(value));
        out.push_str("</uri>");
        return;
    }
    if let Some(stripped) = entity.strip_prefix("_:") {
        out.push_str("<bnode>");
        out.push_str(stripped);
        out.push_str("</bnode>");
        return;
    }
    match entity.rfind('"') {
        None | Some(0) => {
            out.push_str("<literal>");
            out.push_str(&escape_for_xml(entity));
            out.push_str("</literal>");
        }
        Some(quote_pos) => {
            let value = &entity[1..quote_pos];
            let suffix = &entity[quote_pos + 1..];
            if let Some(lang) = suffix.strip_prefix('@') {
                out.push_str(&format!(
                    "<literal xml:lang=\"{lang}\">{}</literal>",
                    escape_for_xml(value)
                ));
            } else if let Some(datatype) = suffix.strip_prefix("^^") {
                let datatype = datatype
                    .strip_prefix('<')
                    .and_then(|d| d.strip_suffix('>'))
                    .unwrap_or(datatype);
                out.push_str(&format!(
                    "<literal datatype=\"{}\">{}</literal>",
                    escape_for_xml(datatype),
                    escape_for_xml(value)
                ));
            } else {
                out.push_str("<literal>");
                out.push_str(&escape_for_xml(value));
                out.push_str("</literal>");
            }
        }
    }
}

#[derive(Debug)]
enum State {
    Prefix,
    Rows,
    Done,
}

/// Streaming SPARQL XML export.
#[derive(Debug)]
pub struct SparqlXmlStream<'a> {
    index: &'a Index,
    result: SharedResult,
    vars: Vec<String>,
    columns: Vec<ColumnIndexAndVariable>,
    rows: Range<usize>,
    state: State,
    cancellation: CancellationHandle,
}

impl<'a> SparqlXmlStream<'a> {
    pub(crate) fn new(
        select: &SelectClause,
        tree: &QueryExecutionTree,
        index: &'a Index,
        result: SharedResult,
        limit_offset: &LimitOffset,
        cancellation: CancellationHandle,
    ) -> SparqlXmlStream<'a> {
        let rows = row_range(limit_offset, &result);
        let vars = select
            .variables
            .iter()
            .map(|v| v.strip_prefix('?').unwrap_or(v).to_string())
            .collect();
        SparqlXmlStream {
            index,
            result,
            vars,
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

impl Iterator for SparqlXmlStream<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            State::Prefix => {
                let mut prefix = String::from(
                    "<?xml version=\"1.0\"?>\n\
                     <sparql xmlns=\"http://www.w3.org/2005/sparql-results#\">\n\
                     <head>",
                );
                for variable in &self.vars {
                    prefix.push_str(&format!("\n  <variable name=\"{variable}\"/>"));
                }
                prefix.push_str("\n</head>\n<results>");
                self.state = State::Rows;
                Some(Ok(prefix.into_bytes()))
            }
            State::Rows => match self.rows.next() {
                Some(row) => {
                    if let Err(cancelled) = self.cancellation.check(STREAM_EXPORT_OP) {
                        self.state = State::Done;
                        return Some(Err(cancelled.into()));
                    }
                    let mut chunk = String::from("\n  <result>");
                    for column in &self.columns {
                        let id = self.result.id_table().at(row, column.column);
                        chunk.push_str(&id_to_xml_binding(
                            &column.variable,
                            id,
                            self.index,
                            self.result.local_vocab(),
                        ));
                    }
                    chunk.push_str("\n  </result>");
                    Some(Ok(chunk.into_bytes()))
                }
                None => {
                    self.state = State::Done;
                    Some(Ok(b"\n</results>\n</sparql>".to_vec()))
                }
            },
            State::Done => None,
        }
    }
}
