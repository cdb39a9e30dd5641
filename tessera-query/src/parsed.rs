//! Frozen parser output.
//!
//! The SPARQL grammar lives elsewhere; the planner and exporter consume the
//! syntactic form defined here and never look back at the query text. All
//! components are plain strings: variables carry their leading `?`, IRIs
//! their angle brackets, literals their quotes. Bare tokens are word
//! sequences for the text operators.

use rustc_hash::FxHashMap;
use std::fmt;
use tessera_core::{id_to_string_and_type, Index, QueryResult, ResolveFlags};

/// Predicate marking a word-in-context triple.
pub const IN_CONTEXT_RELATION: &str = "<in-context>";

/// Predicate marking an entity-has-context triple.
pub const HAS_CONTEXT_RELATION: &str = "<has-context>";

/// A component is a variable iff it starts with `?`.
#[inline]
pub fn is_variable(component: &str) -> bool {
    component.starts_with('?')
}

/// A component is a word sequence iff it is neither a variable nor an IRI.
#[inline]
pub fn is_word_sequence(component: &str) -> bool {
    !is_variable(component) && !component.is_empty() && !component.starts_with('<')
}

/// One triple of the WHERE clause, components as parsed strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparqlTriple {
    pub s: String,
    pub p: String,
    pub o: String,
}

impl SparqlTriple {
    pub fn new(s: impl Into<String>, p: impl Into<String>, o: impl Into<String>) -> SparqlTriple {
        SparqlTriple {
            s: s.into(),
            p: p.into(),
            o: o.into(),
        }
    }

    /// The variables of this triple in (s, p, o) order.
    pub fn variables(&self) -> Vec<&str> {
        [&self.s, &self.p, &self.o]
            .into_iter()
            .filter(|c| is_variable(c))
            .map(String::as_str)
            .collect()
    }
}

impl fmt::Display for SparqlTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.s, self.p, self.o)
    }
}

/// Comparison kind of a filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A two-variable filter of the WHERE clause.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SparqlFilter {
    pub lhs: String,
    pub rhs: String,
    pub kind: FilterKind,
}

impl SparqlFilter {
    pub fn new(lhs: impl Into<String>, rhs: impl Into<String>, kind: FilterKind) -> SparqlFilter {
        SparqlFilter {
            lhs: lhs.into(),
            rhs: rhs.into(),
            kind,
        }
    }
}

/// One ORDER BY key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    pub key: String,
    pub descending: bool,
}

impl OrderKey {
    pub fn asc(key: impl Into<String>) -> OrderKey {
        OrderKey {
            key: key.into(),
            descending: false,
        }
    }

    pub fn desc(key: impl Into<String>) -> OrderKey {
        OrderKey {
            key: key.into(),
            descending: true,
        }
    }
}

/// The SELECT clause: projection list plus the DISTINCT flag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectClause {
    /// Selected variables, with their leading `?`.
    pub variables: Vec<String>,
    pub distinct: bool,
}

/// Position of a component within a generated triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionInTriple {
    Subject,
    Predicate,
    Object,
}

/// Everything a construct component needs to evaluate against one result
/// row.
pub struct ConstructContext<'a> {
    pub row: usize,
    pub result: &'a QueryResult,
    pub variable_columns: &'a FxHashMap<String, usize>,
    pub index: &'a Index,
}

/// One component of a CONSTRUCT template triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConstructComponent {
    /// A variable resolved from the result row.
    Variable(String),
    /// A fixed IRI, evaluates at every position.
    Iri(String),
    /// A fixed literal, evaluates at the object position only.
    Literal(String),
}

impl ConstructComponent {
    /// Evaluate this component for one row. `None` drops the whole
    /// generated triple.
    pub fn evaluate(
        &self,
        context: &ConstructContext<'_>,
        position: PositionInTriple,
    ) -> Option<String> {
        match self {
            ConstructComponent::Variable(name) => {
                let &col = context.variable_columns.get(name)?;
                let id = context.result.id_table().at(context.row, col);
                id_to_string_and_type(
                    context.index,
                    id,
                    context.result.local_vocab(),
                    ResolveFlags::default(),
                    |s| s.to_string(),
                )
                .map(|(value, _)| value)
            }
            ConstructComponent::Iri(iri) => Some(iri.clone()),
            ConstructComponent::Literal(literal) => match position {
                PositionInTriple::Object => Some(literal.clone()),
                _ => None,
            },
        }
    }
}

/// A CONSTRUCT template triple.
pub type ConstructTemplate = [ConstructComponent; 3];

/// The CONSTRUCT clause: ordered template triples.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConstructClause {
    pub triples: Vec<ConstructTemplate>,
}

/// SELECT or CONSTRUCT head of a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QueryClause {
    Select(SelectClause),
    Construct(ConstructClause),
}

/// A fully parsed query, frozen for planning and export.
#[derive(Clone, Debug)]
pub struct ParsedQuery {
    /// The original query string, echoed into tool output.
    pub original: String,
    pub clause: QueryClause,
    pub triples: Vec<SparqlTriple>,
    pub filters: Vec<SparqlFilter>,
    pub order_by: Vec<OrderKey>,
    pub limit_offset: tessera_core::LimitOffset,
    /// Decimal string, possibly empty (= 1).
    pub text_limit: String,
}

impl ParsedQuery {
    /// A SELECT query skeleton over the given triples.
    pub fn select(variables: Vec<String>, triples: Vec<SparqlTriple>) -> ParsedQuery {
        ParsedQuery {
            original: String::new(),
            clause: QueryClause::Select(SelectClause {
                variables,
                distinct: false,
            }),
            triples,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit_offset: tessera_core::LimitOffset::default(),
            text_limit: String::new(),
        }
    }

    /// A CONSTRUCT query skeleton over the given triples.
    pub fn construct(templates: Vec<ConstructTemplate>, triples: Vec<SparqlTriple>) -> ParsedQuery {
        ParsedQuery {
            original: String::new(),
            clause: QueryClause::Construct(ConstructClause { triples: templates }),
            triples,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit_offset: tessera_core::LimitOffset::default(),
            text_limit: String::new(),
        }
    }

    pub fn has_select_clause(&self) -> bool {
        matches!(self.clause, QueryClause::Select(_))
    }

    pub fn select_clause(&self) -> Option<&SelectClause> {
        match &self.clause {
            QueryClause::Select(clause) => Some(clause),
            QueryClause::Construct(_) => None,
        }
    }

    pub fn construct_clause(&self) -> Option<&ConstructClause> {
        match &self.clause {
            QueryClause::Construct(clause) => Some(clause),
            QueryClause::Select(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_classification() {
        assert!(is_variable("?x"));
        assert!(!is_variable("<http://x>"));
        assert!(is_word_sequence("edible mushroom"));
        assert!(!is_word_sequence("?x"));
        assert!(!is_word_sequence("<http://x>"));
        assert!(!is_word_sequence(""));
    }

    #[test]
    fn test_triple_variables() {
        let triple = SparqlTriple::new("?x", "<p>", "?y");
        assert_eq!(triple.variables(), vec!["?x", "?y"]);
        assert_eq!(triple.to_string(), "?x <p> ?y");
    }
}
