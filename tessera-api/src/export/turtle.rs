//! Turtle export of CONSTRUCT results.
//!
//! One `subject predicate object .` line per generated triple. Objects
//! beginning with `"` pass through the normalized-RDF-literal formatter
//! first; the check looks at the first character only.

use super::construct::ConstructTriples;
use super::{row_range, STREAM_EXPORT_OP};
use crate::error::Result;
use crate::escape::valid_rdf_literal_from_normalized;
use tessera_core::{CancellationHandle, Index, SharedResult};
use tessera_query::{ParsedQuery, QueryExecutionTree};

/// Streaming Turtle export.
#[derive(Debug)]
pub struct TurtleStream<'a> {
    triples: ConstructTriples<'a>,
}

impl<'a> TurtleStream<'a> {
    pub(crate) fn new(
        query: &'a ParsedQuery,
        tree: &'a QueryExecutionTree,
        index: &'a Index,
        result: SharedResult,
        cancellation: CancellationHandle,
    ) -> TurtleStream<'a> {
        let templates = query
            .construct_clause()
            .map(|clause| clause.triples.as_slice())
            .unwrap_or_default();
        let rows = row_range(&query.limit_offset, &result);
        TurtleStream {
            triples: ConstructTriples::new(
                templates,
                tree.variable_columns(),
                index,
                result,
                rows,
                cancellation,
                STREAM_EXPORT_OP,
            ),
        }
    }
}

impl Iterator for TurtleStream<'_> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let [subject, predicate, object] = match self.triples.next()? {
            Ok(triple) => triple,
            Err(err) => return Some(Err(err)),
        };
        let mut out = String::with_capacity(subject.len() + predicate.len() + object.len() + 8);
        out.push_str(&subject);
        out.push(' ');
        out.push_str(&predicate);
        out.push(' ');
        if object.starts_with('"') {
            out.push_str(&valid_rdf_literal_from_normalized(&object));
        } else {
            out.push_str(&object);
        }
        out.push_str(" .\n");
        Some(Ok(out.into_bytes()))
    }
}
