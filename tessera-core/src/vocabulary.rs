//! Global and text vocabularies, and the literal-or-IRI surface form.
//!
//! The global vocabulary holds every term of the indexed data in its RDF
//! surface form: `<iri>`, `"literal"`, `"literal"@lang`, or
//! `"literal"^^<datatype>`. Terms are kept sorted so identifier order equals
//! lexical order and lookups are a binary search. The text vocabulary holds
//! plain words from the text corpus.

/// Sorted term dictionary of the global index.
#[derive(Clone, Debug, Default)]
pub struct Vocabulary {
    words: Vec<String>,
}

impl Vocabulary {
    /// Build from an unsorted term list; sorts and deduplicates.
    pub fn from_terms(mut terms: Vec<String>) -> Vocabulary {
        terms.sort();
        terms.dedup();
        Vocabulary { words: terms }
    }

    /// The surface form at `index`. Out-of-range is an invariant violation.
    pub fn index_to_string(&self, index: u64) -> &str {
        &self.words[index as usize]
    }

    /// Look up a term's index by its exact surface form.
    pub fn get_id(&self, term: &str) -> Option<u64> {
        self.words
            .binary_search_by(|word| word.as_str().cmp(term))
            .ok()
            .map(|i| i as u64)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Sorted word dictionary of the text index.
#[derive(Clone, Debug, Default)]
pub struct TextVocabulary {
    words: Vec<String>,
}

impl TextVocabulary {
    pub fn from_words(mut words: Vec<String>) -> TextVocabulary {
        words.sort();
        words.dedup();
        TextVocabulary { words }
    }

    pub fn index_to_string(&self, index: u64) -> &str {
        &self.words[index as usize]
    }

    pub fn get_id(&self, word: &str) -> Option<u64> {
        self.words
            .binary_search_by(|w| w.as_str().cmp(word))
            .ok()
            .map(|i| i as u64)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// A vocabulary entry classified by its surface form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiteralOrIri {
    /// A quoted literal, possibly with `@lang` or `^^<datatype>` suffix.
    Literal(String),
    /// An angle-bracketed IRI.
    Iri(String),
}

impl LiteralOrIri {
    /// Classify a surface-form string. Anything not starting with `"` is
    /// treated as an IRI form.
    pub fn from_string_representation(raw: String) -> LiteralOrIri {
        if raw.starts_with('"') {
            LiteralOrIri::Literal(raw)
        } else {
            LiteralOrIri::Iri(raw)
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, LiteralOrIri::Literal(_))
    }

    /// The content without surrounding quotes or angle brackets. For
    /// literals this is the lexical form only; any language tag or datatype
    /// suffix is stripped.
    pub fn content(&self) -> &str {
        match self {
            LiteralOrIri::Literal(raw) => {
                let inner = &raw[1..];
                match inner.rfind('"') {
                    Some(end) => &inner[..end],
                    None => inner,
                }
            }
            LiteralOrIri::Iri(raw) => raw
                .strip_prefix('<')
                .and_then(|s| s.strip_suffix('>'))
                .unwrap_or(raw),
        }
    }

    /// The full surface form.
    pub fn to_string_representation(&self) -> &str {
        match self {
            LiteralOrIri::Literal(raw) | LiteralOrIri::Iri(raw) => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_sorted_lookup() {
        let vocab = Vocabulary::from_terms(vec![
            "<http://x/b>".to_string(),
            "\"Alice\"".to_string(),
            "<http://x/a>".to_string(),
        ]);
        // Sorted: "Alice" < <http://x/a> < <http://x/b>
        assert_eq!(vocab.index_to_string(0), "\"Alice\"");
        assert_eq!(vocab.get_id("<http://x/b>"), Some(2));
        assert_eq!(vocab.get_id("<http://x/missing>"), None);
    }

    #[test]
    fn test_literal_content() {
        let lit = LiteralOrIri::from_string_representation("\"bonjour\"@fr".to_string());
        assert!(lit.is_literal());
        assert_eq!(lit.content(), "bonjour");

        let typed = LiteralOrIri::from_string_representation("\"42\"^^<http://x/int>".to_string());
        assert_eq!(typed.content(), "42");

        let plain = LiteralOrIri::from_string_representation("\"Alice\"".to_string());
        assert_eq!(plain.content(), "Alice");
    }

    #[test]
    fn test_iri_content() {
        let iri = LiteralOrIri::from_string_representation("<http://x>".to_string());
        assert!(!iri.is_literal());
        assert_eq!(iri.content(), "http://x");
        assert_eq!(iri.to_string_representation(), "<http://x>");
    }
}
