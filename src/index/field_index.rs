//! Persisted field indices
//!
//! One file per indexed field: `<field>_index.json`, a JSON object mapping
//! each stringified value to the IDs of the documents holding it.
//!
//! # Invariants
//!
//! - Keys and ID sets iterate in sorted order (BTreeMap/BTreeSet)
//! - An ID appears under at most one key per field
//! - Empty buckets are removed
//! - Writers modify the file under its lock, starting from the cached copy
//!   or the file, and refresh the cache only after the write
//! - Cold reads never replace a cache entry written while they ran

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::errors::IndexResult;
use crate::cache::{CacheStats, Sweepable, TtlCache};
use crate::storage::{self, FileLocks, IndexLayout};

/// Value -> document IDs for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldIndex {
    buckets: BTreeMap<String, BTreeSet<String>>,
}

impl FieldIndex {
    /// Creates a new empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` under `key`
    pub fn insert(&mut self, key: impl Into<String>, id: impl Into<String>) {
        self.buckets.entry(key.into()).or_default().insert(id.into());
    }

    /// Removes `id` from every bucket
    pub fn remove_id(&mut self, id: &str) -> bool {
        let mut removed = false;
        self.buckets.retain(|_, ids| {
            removed |= ids.remove(id);
            !ids.is_empty()
        });
        removed
    }

    /// IDs stored under exactly `key`
    pub fn lookup_eq(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.buckets.get(key)
    }

    /// Iterates `(key, ids)` in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.buckets.iter()
    }

    /// Union of every bucket
    pub fn all_ids(&self) -> BTreeSet<String> {
        self.buckets.values().flatten().cloned().collect()
    }

    /// ID -> key, used to sort without loading documents
    pub fn invert(&self) -> HashMap<&str, &str> {
        let mut out = HashMap::new();
        for (key, ids) in &self.buckets {
            for id in ids {
                out.insert(id.as_str(), key.as_str());
            }
        }
        out
    }

    /// Returns the number of distinct keys
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Loads, caches and updates the field index files of one index.
#[derive(Debug)]
pub struct FieldIndexStore {
    layout: IndexLayout,
    locks: Arc<FileLocks>,
    cache: Arc<TtlCache<String, Arc<FieldIndex>>>,
}

impl FieldIndexStore {
    pub fn new(layout: IndexLayout, locks: Arc<FileLocks>, capacity: usize, ttl: Duration) -> Self {
        Self {
            layout,
            locks,
            cache: Arc::new(TtlCache::new(capacity, ttl)),
        }
    }

    fn cache_key(field: &str) -> String {
        field.to_lowercase()
    }

    /// The cache, for registration with the sweeper
    pub fn sweepable(&self) -> Arc<dyn Sweepable> {
        self.cache.clone()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Reads a field index from disk. A corrupt file is treated as empty.
    async fn read_from_disk(&self, field: &str) -> FieldIndex {
        let path = self.layout.field_index_path(field);
        match storage::read_json::<FieldIndex>(&path).await {
            Ok(found) => found.unwrap_or_default(),
            Err(e) => {
                warn!(field, path = %path.display(), error = %e, "field index unreadable, treating as empty");
                FieldIndex::new()
            }
        }
    }

    /// Returns the field index, from cache when possible
    pub async fn load(&self, field: &str) -> Arc<FieldIndex> {
        let key = Self::cache_key(field);
        if let Some(index) = self.cache.get(&key) {
            return index;
        }
        let generation = self.cache.generation();
        let index = Arc::new(self.read_from_disk(field).await);
        self.cache.put_if_unchanged(key, index.clone(), generation);
        index
    }

    /// Read-modify-write of one field index under its file lock.
    ///
    /// Starts from the cached copy when there is one; every writer holds the
    /// same lock and refreshes the cache after persisting.
    pub async fn update<F>(&self, field: &str, apply: F) -> IndexResult<()>
    where
        F: FnOnce(&mut FieldIndex),
    {
        let key = Self::cache_key(field);
        let path = self.layout.field_index_path(field);
        let _guard = self.locks.lock(&path).await;

        let mut index = match self.cache.get(&key) {
            Some(cached) => FieldIndex::clone(&cached),
            None => self.read_from_disk(field).await,
        };
        apply(&mut index);

        match storage::write_json(&path, &index).await {
            Ok(_) => {
                self.cache.put(key, Arc::new(index));
                Ok(())
            }
            Err(e) => {
                self.cache.invalidate(&key);
                Err(e)
            }
        }
    }

    /// Replaces a field index wholesale
    pub async fn replace(&self, field: &str, index: FieldIndex) -> IndexResult<()> {
        let path = self.layout.field_index_path(field);
        let _guard = self.locks.lock(&path).await;
        storage::write_json(&path, &index).await?;
        debug!(field, keys = index.key_count(), "field index replaced");
        self.cache.put(Self::cache_key(field), Arc::new(index));
        Ok(())
    }

    /// Deletes a field index file
    pub async fn delete(&self, field: &str) -> IndexResult<()> {
        let path = self.layout.field_index_path(field);
        let _guard = self.locks.lock(&path).await;
        let result = storage::remove_if_exists(&path).await.map(|_| ());
        self.cache.invalidate(&Self::cache_key(field));
        result
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}
