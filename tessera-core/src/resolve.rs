//! Identifier resolution: the two-level vocabulary facade.
//!
//! [`id_to_string_and_type`] turns an [`Id`] into its lexical form plus an
//! optional datatype IRI, dispatching on the identifier's tag. Vocabulary
//! and text lookups go through the escape hook the caller supplies;
//! value-encoded identifiers (ints, doubles, bools, dates, blank nodes)
//! format directly and bypass both the escape hook and the
//! remove-quotes flag.

use crate::datatype::Datatype;
use crate::id::Id;
use crate::index::Index;
use crate::local_vocab::LocalVocab;
use crate::vocabulary::LiteralOrIri;

pub const XSD_INT_TYPE: &str = "http://www.w3.org/2001/XMLSchema#int";
pub const XSD_DECIMAL_TYPE: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_BOOLEAN_TYPE: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DATE_TYPE: &str = "http://www.w3.org/2001/XMLSchema#date";

/// Orthogonal switches for [`id_to_string_and_type`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveFlags {
    /// Strip the surrounding `"..."` or `<...>` before escaping (CSV cells
    /// carry the raw lexical form).
    pub remove_quotes_and_angle_brackets: bool,
    /// Return `None` for everything that is not a literal (CONSTRUCT
    /// object-position evaluation).
    pub only_literals: bool,
}

/// A resolved identifier: the lexical form and an optional datatype IRI.
pub type StringAndType = (String, Option<&'static str>);

/// Resolve a value-encoded identifier (no vocabulary access needed).
fn encoded_value_to_string_and_type(id: Id) -> Option<StringAndType> {
    match id.datatype() {
        Datatype::Undefined => None,
        Datatype::Double => {
            let d = id.double_value();
            // Format as integer if the fractional part is zero, default
            // formatting otherwise.
            let formatted = if d.fract() == 0.0 {
                format!("{d:.0}")
            } else {
                format!("{d}")
            };
            Some((formatted, Some(XSD_DECIMAL_TYPE)))
        }
        Datatype::Bool => {
            let s = if id.bool_value() { "true" } else { "false" };
            Some((s.to_string(), Some(XSD_BOOLEAN_TYPE)))
        }
        Datatype::Int => Some((id.int_value().to_string(), Some(XSD_INT_TYPE))),
        Datatype::Date => Some((
            id.date_value().format("%Y-%m-%d").to_string(),
            Some(XSD_DATE_TYPE),
        )),
        Datatype::BlankNodeIndex => Some((format!("_:bn{}", id.blank_node_index()), None)),
        other => panic!("not a value-encoded datatype: {other:?}"),
    }
}

/// Resolve an identifier against the global index and a per-result local
/// vocabulary.
///
/// Returns `None` for unbound identifiers, and for everything outside the
/// requested class when [`ResolveFlags::only_literals`] is set. The escape
/// function is applied to vocabulary, word, and text-record strings; the
/// lexical forms of value-encoded identifiers are emitted as-is.
pub fn id_to_string_and_type<F>(
    index: &Index,
    id: Id,
    local_vocab: &LocalVocab,
    flags: ResolveFlags,
    escape: F,
) -> Option<StringAndType>
where
    F: Fn(&str) -> String,
{
    let datatype = id.datatype();
    if flags.only_literals
        && !matches!(datatype, Datatype::VocabIndex | Datatype::LocalVocabIndex)
    {
        return None;
    }

    match datatype {
        Datatype::WordVocabIndex => {
            Some((escape(index.word_to_string(id.word_vocab_index())), None))
        }
        Datatype::VocabIndex | Datatype::LocalVocabIndex => {
            let word = if datatype == Datatype::VocabIndex {
                LiteralOrIri::from_string_representation(
                    index.index_to_string(id.vocab_index()).to_string(),
                )
            } else {
                LiteralOrIri::from_string_representation(
                    local_vocab.word(id.local_vocab_index()).to_string(),
                )
            };
            if flags.only_literals && !word.is_literal() {
                return None;
            }
            if flags.remove_quotes_and_angle_brackets {
                Some((escape(word.content()), None))
            } else {
                Some((escape(word.to_string_representation()), None))
            }
        }
        Datatype::TextRecordIndex => {
            Some((escape(index.text_excerpt(id.text_record_index())), None))
        }
        _ => encoded_value_to_string_and_type(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::{TextVocabulary, Vocabulary};
    use chrono::NaiveDate;

    fn identity(s: &str) -> String {
        s.to_string()
    }

    fn make_test_index() -> Index {
        let vocab = Vocabulary::from_terms(vec![
            "<http://x>".to_string(),
            "\"Alice\"".to_string(),
            "\"bonjour\"@fr".to_string(),
        ]);
        let text_vocab = TextVocabulary::from_words(vec!["mushroom".to_string()]);
        let mut index = Index::new(vocab, text_vocab);
        index.add_excerpt("an excerpt about mushrooms");
        index
    }

    #[test]
    fn test_undefined_resolves_to_none() {
        let index = make_test_index();
        let vocab = LocalVocab::new();
        assert!(id_to_string_and_type(
            &index,
            Id::UNDEFINED,
            &vocab,
            ResolveFlags::default(),
            identity
        )
        .is_none());
    }

    #[test]
    fn test_encoded_values() {
        let index = make_test_index();
        let vocab = LocalVocab::new();
        let flags = ResolveFlags::default();

        let (s, t) = id_to_string_and_type(&index, Id::from_int(-7), &vocab, flags, identity).unwrap();
        assert_eq!((s.as_str(), t), ("-7", Some(XSD_INT_TYPE)));

        let (s, t) =
            id_to_string_and_type(&index, Id::from_double(2.0), &vocab, flags, identity).unwrap();
        assert_eq!((s.as_str(), t), ("2", Some(XSD_DECIMAL_TYPE)));

        let (s, t) =
            id_to_string_and_type(&index, Id::from_double(2.5), &vocab, flags, identity).unwrap();
        assert_eq!((s.as_str(), t), ("2.5", Some(XSD_DECIMAL_TYPE)));

        let (s, t) =
            id_to_string_and_type(&index, Id::from_bool(true), &vocab, flags, identity).unwrap();
        assert_eq!((s.as_str(), t), ("true", Some(XSD_BOOLEAN_TYPE)));

        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let (s, t) =
            id_to_string_and_type(&index, Id::from_date(date), &vocab, flags, identity).unwrap();
        assert_eq!((s.as_str(), t), ("2024-01-15", Some(XSD_DATE_TYPE)));

        let (s, t) =
            id_to_string_and_type(&index, Id::from_blank_node_index(4), &vocab, flags, identity)
                .unwrap();
        assert_eq!((s.as_str(), t), ("_:bn4", None));
    }

    #[test]
    fn test_vocab_and_local_vocab_lookup() {
        let index = make_test_index();
        let mut vocab = LocalVocab::new();
        let local = vocab.get_or_add("\"synthesised\"");
        let flags = ResolveFlags::default();

        let id = index.get_id("\"Alice\"").unwrap();
        let (s, t) = id_to_string_and_type(&index, id, &vocab, flags, identity).unwrap();
        assert_eq!((s.as_str(), t), ("\"Alice\"", None));

        let id = Id::from_local_vocab_index(local);
        let (s, _) = id_to_string_and_type(&index, id, &vocab, flags, identity).unwrap();
        assert_eq!(s, "\"synthesised\"");
    }

    #[test]
    fn test_remove_quotes_and_angle_brackets() {
        let index = make_test_index();
        let vocab = LocalVocab::new();
        let flags = ResolveFlags {
            remove_quotes_and_angle_brackets: true,
            only_literals: false,
        };

        let id = index.get_id("\"bonjour\"@fr").unwrap();
        let (s, _) = id_to_string_and_type(&index, id, &vocab, flags, identity).unwrap();
        assert_eq!(s, "bonjour");

        let id = index.get_id("<http://x>").unwrap();
        let (s, _) = id_to_string_and_type(&index, id, &vocab, flags, identity).unwrap();
        assert_eq!(s, "http://x");
    }

    #[test]
    fn test_only_literals() {
        let index = make_test_index();
        let vocab = LocalVocab::new();
        let flags = ResolveFlags {
            remove_quotes_and_angle_brackets: false,
            only_literals: true,
        };

        // IRIs and encoded values are filtered out.
        let iri = index.get_id("<http://x>").unwrap();
        assert!(id_to_string_and_type(&index, iri, &vocab, flags, identity).is_none());
        assert!(id_to_string_and_type(&index, Id::from_int(1), &vocab, flags, identity).is_none());

        // Literals pass.
        let lit = index.get_id("\"Alice\"").unwrap();
        assert!(id_to_string_and_type(&index, lit, &vocab, flags, identity).is_some());
    }

    #[test]
    fn test_word_and_text_record() {
        let index = make_test_index();
        let vocab = LocalVocab::new();
        let flags = ResolveFlags::default();

        let id = Id::from_word_vocab_index(0);
        let (s, t) = id_to_string_and_type(&index, id, &vocab, flags, identity).unwrap();
        assert_eq!((s.as_str(), t), ("mushroom", None));

        let id = Id::from_text_record_index(0);
        let (s, t) = id_to_string_and_type(&index, id, &vocab, flags, identity).unwrap();
        assert_eq!((s.as_str(), t), ("an excerpt about mushrooms", None));
    }

    #[test]
    fn test_escape_applied_to_vocab_strings_only() {
        let index = make_test_index();
        let vocab = LocalVocab::new();
        let flags = ResolveFlags::default();
        let shout = |s: &str| s.to_uppercase();

        let id = index.get_id("\"Alice\"").unwrap();
        let (s, _) = id_to_string_and_type(&index, id, &vocab, flags, shout).unwrap();
        assert_eq!(s, "\"ALICE\"");

        // Encoded values bypass the escape hook.
        let (s, _) = id_to_string_and_type(&index, Id::from_int(12), &vocab, flags, shout).unwrap();
        assert_eq!(s, "12");
    }
}
