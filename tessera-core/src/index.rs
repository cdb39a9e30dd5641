//! In-memory index facade.
//!
//! The planner and exporter consume a narrow slice of the full on-disk
//! index: vocabulary lookups in both directions, text excerpts, and
//! cardinality estimates for scans and word sequences. [`Index`] carries
//! exactly that surface. The permutation files themselves live behind the
//! scan operators and are not represented here.

use crate::id::Id;
use crate::vocabulary::{TextVocabulary, Vocabulary};
use rustc_hash::FxHashMap;

/// Fallback cardinality for predicates without recorded statistics.
const DEFAULT_RELATION_CARDINALITY: usize = 1000;

/// Average fan-out assumed when a scan fixes a second component.
const BOUND_SCAN_DIVISOR: usize = 10;

/// Fallback estimate for words without recorded postings counts.
const DEFAULT_WORD_ESTIMATE: usize = 100;

/// Process-lifetime read-only view of the indexed data.
#[derive(Clone, Debug, Default)]
pub struct Index {
    vocab: Vocabulary,
    text_vocab: TextVocabulary,
    excerpts: Vec<String>,
    relation_cardinalities: FxHashMap<String, usize>,
    word_estimates: FxHashMap<String, usize>,
}

impl Index {
    pub fn new(vocab: Vocabulary, text_vocab: TextVocabulary) -> Index {
        Index {
            vocab,
            text_vocab,
            ..Index::default()
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn text_vocab(&self) -> &TextVocabulary {
        &self.text_vocab
    }

    /// Resolve a term's surface form to its vocabulary identifier.
    pub fn get_id(&self, term: &str) -> Option<Id> {
        self.vocab.get_id(term).map(Id::from_vocab_index)
    }

    /// The surface form of a global vocabulary entry.
    pub fn index_to_string(&self, index: u64) -> &str {
        self.vocab.index_to_string(index)
    }

    /// The word of a text vocabulary entry.
    pub fn word_to_string(&self, index: u64) -> &str {
        self.text_vocab.index_to_string(index)
    }

    /// Register a text record, returning its index.
    pub fn add_excerpt(&mut self, excerpt: impl Into<String>) -> u64 {
        self.excerpts.push(excerpt.into());
        (self.excerpts.len() - 1) as u64
    }

    /// The excerpt of a text record.
    pub fn text_excerpt(&self, index: u64) -> &str {
        &self.excerpts[index as usize]
    }

    /// Record the number of triples for a predicate.
    pub fn set_relation_cardinality(&mut self, predicate: impl Into<String>, cardinality: usize) {
        self.relation_cardinalities.insert(predicate.into(), cardinality);
    }

    /// Estimated number of triples for a predicate.
    pub fn relation_cardinality(&self, predicate: &str) -> usize {
        self.relation_cardinalities
            .get(predicate)
            .copied()
            .unwrap_or(DEFAULT_RELATION_CARDINALITY)
    }

    /// Estimated result size of a permutation scan over `predicate`.
    /// `num_fixed` counts the fixed components besides the predicate (0 or 1).
    pub fn scan_size_estimate(&self, predicate: &str, num_fixed: usize) -> usize {
        let full = self.relation_cardinality(predicate);
        match num_fixed {
            0 => full,
            _ => (full / BOUND_SCAN_DIVISOR).max(1),
        }
    }

    /// Record the postings count for a text word.
    pub fn set_word_estimate(&mut self, word: impl Into<String>, estimate: usize) {
        self.word_estimates.insert(word.into(), estimate);
    }

    /// Estimated number of contexts matching a space-separated word
    /// sequence: the minimum over the individual words.
    pub fn text_size_estimate(&self, words: &str) -> usize {
        words
            .split_whitespace()
            .map(|word| {
                self.word_estimates
                    .get(word)
                    .copied()
                    .unwrap_or(DEFAULT_WORD_ESTIMATE)
            })
            .min()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_index() -> Index {
        let vocab = Vocabulary::from_terms(vec![
            "<http://x/p>".to_string(),
            "\"Alice\"".to_string(),
        ]);
        Index::new(vocab, TextVocabulary::default())
    }

    #[test]
    fn test_get_id_round_trip() {
        let index = make_test_index();
        let id = index.get_id("<http://x/p>").unwrap();
        assert_eq!(index.index_to_string(id.vocab_index()), "<http://x/p>");
        assert!(index.get_id("<http://x/missing>").is_none());
    }

    #[test]
    fn test_scan_estimates() {
        let mut index = make_test_index();
        index.set_relation_cardinality("<http://x/p>", 500);
        assert_eq!(index.scan_size_estimate("<http://x/p>", 0), 500);
        assert_eq!(index.scan_size_estimate("<http://x/p>", 1), 50);
        // Unknown predicates fall back to the default.
        assert_eq!(index.scan_size_estimate("<http://x/q>", 0), 1000);
    }

    #[test]
    fn test_text_estimate_is_minimum() {
        let mut index = make_test_index();
        index.set_word_estimate("edible", 40);
        index.set_word_estimate("mushroom", 7);
        assert_eq!(index.text_size_estimate("edible mushroom"), 7);
        assert_eq!(index.text_size_estimate(""), 0);
    }

    #[test]
    fn test_excerpts() {
        let mut index = make_test_index();
        let i = index.add_excerpt("some record text");
        assert_eq!(index.text_excerpt(i), "some record text");
    }
}
