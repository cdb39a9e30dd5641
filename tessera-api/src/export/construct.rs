//! CONSTRUCT template instantiation.
//!
//! Evaluates the template triples against each exported result row and
//! yields the generated `(subject, predicate, object)` string triples.
//! Triples with any unbound component are skipped. Every produced triple
//! is a suspension point and polls the cancellation handle.

use crate::error::Result;
use rustc_hash::FxHashMap;
use std::ops::Range;
use tessera_core::{CancellationHandle, Index, SharedResult};
use tessera_query::{ConstructContext, ConstructTemplate, PositionInTriple};

/// Pull-based generator of the triples a CONSTRUCT query produces.
#[derive(Debug)]
pub struct ConstructTriples<'a> {
    templates: &'a [ConstructTemplate],
    variable_columns: &'a FxHashMap<String, usize>,
    index: &'a Index,
    result: SharedResult,
    rows: Range<usize>,
    current_row: Option<usize>,
    template_index: usize,
    cancellation: CancellationHandle,
    operation: &'static str,
    failed: bool,
}

impl<'a> ConstructTriples<'a> {
    pub(crate) fn new(
        templates: &'a [ConstructTemplate],
        variable_columns: &'a FxHashMap<String, usize>,
        index: &'a Index,
        result: SharedResult,
        rows: Range<usize>,
        cancellation: CancellationHandle,
        operation: &'static str,
    ) -> ConstructTriples<'a> {
        ConstructTriples {
            templates,
            variable_columns,
            index,
            result,
            rows,
            current_row: None,
            template_index: 0,
            cancellation,
            operation,
            failed: false,
        }
    }
}

impl Iterator for ConstructTriples<'_> {
    type Item = Result<[String; 3]>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            let row = match self.current_row {
                Some(row) => row,
                None => {
                    let row = self.rows.next()?;
                    self.current_row = Some(row);
                    self.template_index = 0;
                    row
                }
            };
            if self.template_index >= self.templates.len() {
                self.current_row = None;
                continue;
            }
            let template = &self.templates[self.template_index];
            self.template_index += 1;

            if let Err(cancelled) = self.cancellation.check(self.operation) {
                self.failed = true;
                return Some(Err(cancelled.into()));
            }

            let context = ConstructContext {
                row,
                result: &self.result,
                variable_columns: self.variable_columns,
                index: self.index,
            };
            let subject = template[0].evaluate(&context, PositionInTriple::Subject);
            let predicate = template[1].evaluate(&context, PositionInTriple::Predicate);
            let object = template[2].evaluate(&context, PositionInTriple::Object);
            let (Some(s), Some(p), Some(o)) = (subject, predicate, object) else {
                // Incomplete triple: skip.
                continue;
            };
            return Some(Ok([s, p, o]));
        }
    }
}
