//! Persisted inverted text index with relevance scoring
//!
//! `fulltext_index.json` maps each word to `{documentId: termFrequency}`.
//! The vocabulary trie is derived from it on load and never persisted.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::tokenizer::{term_frequencies, tokenize};
use super::trie::Trie;
use crate::index::{IndexError, IndexResult};
use crate::storage::{self, FileLocks, IndexLayout};

const EXACT_WEIGHT: f64 = 1.0;
const SUBSTRING_WEIGHT: f64 = 0.8;
const PREFIX_WEIGHT: f64 = 0.7;
const SYNONYM_FACTOR: f64 = 0.8;
const MAX_TF_FACTOR: f64 = 2.0;
const MAX_CORRECTION_DISTANCE: usize = 2;

type Postings = BTreeMap<String, BTreeMap<String, u32>>;

#[derive(Debug, Default)]
struct TextState {
    postings: Postings,
    vocabulary: Trie,
}

impl TextState {
    fn from_postings(postings: Postings) -> Self {
        let mut vocabulary = Trie::new();
        for word in postings.keys() {
            vocabulary.insert(word);
        }
        Self {
            postings,
            vocabulary,
        }
    }

    fn remove_document(&mut self, id: &str) {
        let mut emptied = Vec::new();
        for (word, docs) in self.postings.iter_mut() {
            if docs.remove(id).is_some() && docs.is_empty() {
                emptied.push(word.clone());
            }
        }
        for word in emptied {
            self.postings.remove(&word);
            self.vocabulary.remove(&word);
        }
    }

    fn add_document(&mut self, id: &str, text: &str) {
        for (word, tf) in term_frequencies(text) {
            if !self.postings.contains_key(&word) {
                self.vocabulary.insert(&word);
            }
            self.postings
                .entry(word)
                .or_default()
                .insert(id.to_string(), tf);
        }
    }

    /// Words matching one query term, with their base weight
    fn matches_for(&self, term: &str) -> Vec<(String, f64)> {
        let mut matches = Vec::new();
        for word in self.vocabulary.with_prefix(term) {
            let weight = if word == term { EXACT_WEIGHT } else { PREFIX_WEIGHT };
            matches.push((word, weight));
        }
        for word in self.postings.keys() {
            if word.contains(term) && !word.starts_with(term) {
                matches.push((word.clone(), SUBSTRING_WEIGHT));
            }
        }
        matches
    }

    /// Closest known word within the correction distance
    fn correct(&self, term: &str) -> Option<String> {
        self.postings
            .keys()
            .map(|w| (strsim::levenshtein(term, w), w))
            .filter(|(d, _)| *d <= MAX_CORRECTION_DISTANCE)
            .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
            .map(|(_, w)| w.clone())
    }

    fn add_scores(&self, word: &str, weight: f64, scores: &mut HashMap<String, f64>) {
        if let Some(docs) = self.postings.get(word) {
            for (id, tf) in docs {
                let tf_factor = (*tf as f64 / 10.0).min(MAX_TF_FACTOR);
                *scores.entry(id.clone()).or_insert(0.0) += weight * tf_factor;
            }
        }
    }
}

/// Full-text index of one search index.
#[derive(Debug)]
pub struct FullTextIndex {
    path: PathBuf,
    locks: Arc<FileLocks>,
    state: RwLock<TextState>,
    synonyms: BTreeMap<String, Vec<String>>,
}

impl FullTextIndex {
    /// Loads `fulltext_index.json`. An unreadable file starts empty.
    pub async fn open(
        layout: &IndexLayout,
        locks: Arc<FileLocks>,
        synonyms: BTreeMap<String, Vec<String>>,
    ) -> Self {
        let path = layout.fulltext_path();
        let postings = match storage::read_json::<Postings>(&path).await {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "full-text index unreadable, starting empty");
                Postings::new()
            }
        };

        Self {
            path,
            locks,
            state: RwLock::new(TextState::from_postings(postings)),
            synonyms,
        }
    }

    fn poisoned() -> IndexError {
        IndexError::Search("full-text index lock poisoned".to_string())
    }

    /// Applies `change` and persists the result under the file lock
    async fn modify<F>(&self, change: F) -> IndexResult<()>
    where
        F: FnOnce(&mut TextState),
    {
        let _guard = self.locks.lock(&self.path).await;
        let bytes = {
            let mut state = self.state.write().map_err(|_| Self::poisoned())?;
            change(&mut *state);
            serde_json::to_vec_pretty(&state.postings)
                .map_err(|e| IndexError::corrupt(&self.path, e))?
        };
        storage::write_atomic(&self.path, &bytes).await
    }

    /// Replaces the postings of one document
    pub async fn index_document(&self, id: &str, text: &str) -> IndexResult<()> {
        self.modify(|state| {
            state.remove_document(id);
            state.add_document(id, text);
        })
        .await
    }

    pub async fn remove_document(&self, id: &str) -> IndexResult<()> {
        self.modify(|state| state.remove_document(id)).await
    }

    /// Rebuilds the whole index from `(id, text)` pairs
    pub async fn rebuild(&self, documents: &[(String, String)]) -> IndexResult<()> {
        self.modify(|state| {
            *state = TextState::default();
            for (id, text) in documents {
                state.add_document(id, text);
            }
        })
        .await?;
        debug!(documents = documents.len(), "full-text index rebuilt");
        Ok(())
    }

    /// Drops all postings and deletes the file
    pub async fn clear(&self) -> IndexResult<()> {
        let _guard = self.locks.lock(&self.path).await;
        {
            let mut state = self.state.write().map_err(|_| Self::poisoned())?;
            *state = TextState::default();
        }
        storage::remove_if_exists(&self.path).await.map(|_| ())
    }

    fn synonyms_of(&self, term: &str) -> Vec<String> {
        let mut out: Vec<String> = self.synonyms.get(term).cloned().unwrap_or_default();
        for (key, alternatives) in &self.synonyms {
            if alternatives.iter().any(|a| a == term) && key != term {
                out.push(key.clone());
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Scores every document matching any query term.
    pub fn search(&self, query: &str) -> IndexResult<HashMap<String, f64>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let mut scores = HashMap::new();

        for term in tokenize(query) {
            let mut matches = state.matches_for(&term);

            if matches.is_empty() {
                if let Some(corrected) = state.correct(&term) {
                    debug!(term = %term, corrected = %corrected, "query term corrected");
                    matches.push((corrected, EXACT_WEIGHT));
                }
            }

            for synonym in self.synonyms_of(&term) {
                if state.postings.contains_key(&synonym) && !matches.iter().any(|(w, _)| *w == synonym) {
                    matches.push((synonym, EXACT_WEIGHT * SYNONYM_FACTOR));
                }
            }

            for (word, weight) in &matches {
                state.add_scores(word, *weight, &mut scores);
            }
        }

        Ok(scores)
    }

    /// Completions for `prefix`, most frequent first
    pub fn suggest(&self, prefix: &str, limit: usize) -> IndexResult<Vec<String>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let mut words = state.vocabulary.with_prefix(&prefix);
        let freq = |w: &String| state.postings.get(w).map_or(0, |d| d.len());
        words.sort_by(|a, b| freq(b).cmp(&freq(a)).then_with(|| a.cmp(b)));
        words.truncate(limit);
        Ok(words)
    }

    /// Number of distinct words
    pub fn word_count(&self) -> usize {
        self.state.read().map(|s| s.vocabulary.len()).unwrap_or(0)
    }
}
