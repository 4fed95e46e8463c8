//! Text normalization
//!
//! Lowercase, split on anything that is not alphanumeric, keep tokens of at
//! least two characters, drop English stop words.

use std::collections::BTreeMap;

const MIN_TOKEN_CHARS: usize = 2;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "he",
    "her", "his", "if", "in", "into", "is", "it", "its", "no", "not", "of", "on", "or", "our",
    "she", "so", "such", "that", "the", "their", "then", "there", "these", "they", "this", "to",
    "was", "we", "were", "will", "with", "you", "your",
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Splits text into normalized tokens, in order of appearance
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS && !is_stop_word(t))
        .collect()
}

/// Token -> number of occurrences
pub fn term_frequencies(text: &str) -> BTreeMap<String, u32> {
    let mut freqs = BTreeMap::new();
    for token in tokenize(text) {
        *freqs.entry(token).or_insert(0) += 1;
    }
    freqs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_sorted_for_binary_search() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOP_WORDS);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("The Quiet Villa, near the Beach! A-1"),
            vec!["quiet", "villa", "near", "beach"]
        );
    }

    #[test]
    fn test_term_frequencies() {
        let freqs = term_frequencies("pool pool villa");
        assert_eq!(freqs["pool"], 2);
        assert_eq!(freqs["villa"], 1);
    }
}
