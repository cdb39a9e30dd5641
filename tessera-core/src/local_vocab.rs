//! Per-result local vocabulary.
//!
//! Terms synthesised during query evaluation (and therefore absent from the
//! global index vocabulary) are interned here. A local vocabulary lives as
//! long as the result it annotates and is read-only once the result is
//! produced.

use rustc_hash::FxHashMap;

/// Append-only interned string table.
#[derive(Clone, Debug, Default)]
pub struct LocalVocab {
    words: Vec<String>,
    by_word: FxHashMap<String, u64>,
}

impl LocalVocab {
    pub fn new() -> LocalVocab {
        LocalVocab::default()
    }

    /// Intern a word, returning its index. Repeated calls with the same
    /// word return the same index.
    pub fn get_or_add(&mut self, word: &str) -> u64 {
        if let Some(&index) = self.by_word.get(word) {
            return index;
        }
        let index = self.words.len() as u64;
        self.words.push(word.to_string());
        self.by_word.insert(word.to_string(), index);
        index
    }

    /// The word at `index`. Out-of-range indices are an invariant violation.
    pub fn word(&self, index: u64) -> &str {
        &self.words[index as usize]
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning() {
        let mut vocab = LocalVocab::new();
        let a = vocab.get_or_add("\"synthesised\"");
        let b = vocab.get_or_add("<http://example.org/x>");
        let a2 = vocab.get_or_add("\"synthesised\"");

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(vocab.word(a), "\"synthesised\"");
        assert_eq!(vocab.len(), 2);
    }
}
