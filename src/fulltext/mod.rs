//! Full-text search
//!
//! Words from an index's text fields feed an inverted index with term
//! frequencies. Query terms match exactly, by prefix or by substring, and
//! unknown terms are corrected to the nearest known word.

mod engine;
mod tokenizer;
mod trie;

pub use engine::FullTextIndex;
pub use tokenizer::{is_stop_word, term_frequencies, tokenize};
pub use trie::Trie;
