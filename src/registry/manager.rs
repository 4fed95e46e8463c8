//! Registry of open indices

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::merge::merge_ranked;
use crate::config::CacheConfig;
use crate::index::{
    Document, FieldAccessors, IndexConfiguration, IndexDescriptor, IndexError, IndexResult,
    SearchIndex,
};
use crate::query::{RankedIds, SearchHit, SearchRequest, SearchResult};
use crate::storage::{self, IndexMetadata, METADATA_FILE};

fn poisoned() -> IndexError {
    IndexError::Configuration("registry lock poisoned".into())
}

/// Registry of indices sharing one storage root, accessor table and cache
/// configuration.
pub struct IndexRegistry<T: Document> {
    root: PathBuf,
    accessors: FieldAccessors<T>,
    cache: CacheConfig,
    indices: RwLock<HashMap<String, Arc<SearchIndex<T>>>>,
}

impl<T: Document> std::fmt::Debug for IndexRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("root", &self.root)
            .field("indices", &self.list_index_ids())
            .finish()
    }
}

impl<T: Document> IndexRegistry<T> {
    pub fn new(root: impl Into<PathBuf>, accessors: FieldAccessors<T>, cache: CacheConfig) -> Self {
        Self {
            root: root.into(),
            accessors,
            cache,
            indices: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn contains(&self, id: &str) -> IndexResult<bool> {
        let indices = self.indices.read().map_err(|_| poisoned())?;
        Ok(indices.contains_key(id))
    }

    /// Opens and registers a new index under the registry root.
    pub async fn create_index(&self, mut descriptor: IndexDescriptor) -> IndexResult<Arc<SearchIndex<T>>> {
        descriptor.storage_root = self.root.clone();
        let configuration = IndexConfiguration::new(descriptor, self.accessors.clone())
            .with_cache(self.cache.clone());
        self.create_index_with(configuration).await
    }

    /// Opens and registers an index with its own accessors and cache tuning.
    pub async fn create_index_with(
        &self,
        configuration: IndexConfiguration<T>,
    ) -> IndexResult<Arc<SearchIndex<T>>> {
        let id = configuration.descriptor.id.clone();
        if self.contains(&id)? {
            return Err(IndexError::DuplicateKey(id));
        }

        let index = Arc::new(SearchIndex::open(configuration).await?);

        let lost_race = {
            let mut indices = self.indices.write().map_err(|_| poisoned())?;
            if indices.contains_key(&id) {
                true
            } else {
                indices.insert(id.clone(), Arc::clone(&index));
                false
            }
        };
        if lost_race {
            index.dispose().await?;
            return Err(IndexError::DuplicateKey(id));
        }

        info!(index_id = %id, "index registered");
        Ok(index)
    }

    pub fn get_index(&self, id: &str) -> IndexResult<Option<Arc<SearchIndex<T>>>> {
        let indices = self.indices.read().map_err(|_| poisoned())?;
        Ok(indices.get(id).cloned())
    }

    /// Disposes and unregisters an index, then deletes its `metadata.json`.
    /// Returns false if no such index was registered.
    pub async fn remove_index(&self, id: &str) -> IndexResult<bool> {
        let removed = {
            let mut indices = self.indices.write().map_err(|_| poisoned())?;
            indices.remove(id)
        };
        let Some(index) = removed else {
            return Ok(false);
        };

        index.dispose().await?;
        storage::remove_if_exists(&index.dir().join(METADATA_FILE)).await?;
        info!(index_id = %id, "index removed");
        Ok(true)
    }

    /// Registered IDs, sorted
    pub fn list_index_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.indices.read() {
            Ok(indices) => indices.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        ids.sort();
        ids
    }

    /// Searches several indices concurrently and merges the results.
    ///
    /// Unknown IDs are ignored. An index whose search fails is left out of
    /// the merge; the merged result fails only if every index failed.
    pub async fn search_multiple(&self, ids: &[String], request: &SearchRequest) -> SearchResult<T> {
        let started = Instant::now();
        if let Err(e) = request.validate() {
            return SearchResult::failure(e.to_string(), request.page_number, request.page_size);
        }

        let mut targets = Vec::new();
        for id in ids {
            match self.get_index(id) {
                Ok(Some(index)) => {
                    if !targets.iter().any(|t: &Arc<SearchIndex<T>>| t.id() == id.as_str()) {
                        targets.push(index);
                    }
                }
                Ok(None) => debug!(index_id = %id, "skipping unknown index"),
                Err(e) => {
                    return SearchResult::failure(e.to_string(), request.page_number, request.page_size)
                }
            }
        }

        let rankings = join_all(targets.iter().map(|index| index.rank(request))).await;

        let mut succeeded: Vec<(&SearchIndex<T>, RankedIds)> = Vec::new();
        let mut last_error = None;
        for (index, ranking) in targets.iter().zip(rankings) {
            match ranking {
                Ok(ranking) => succeeded.push((index.as_ref(), ranking)),
                Err(e) => {
                    warn!(index_id = %index.id(), error = %e, "index search failed, excluded from merge");
                    last_error = Some(e.to_string());
                }
            }
        }
        if succeeded.is_empty() {
            if let Some(message) = last_error {
                return SearchResult::failure(message, request.page_number, request.page_size);
            }
        }

        let inputs: Vec<(&str, &RankedIds)> = succeeded
            .iter()
            .map(|(index, ranking)| (index.id(), ranking))
            .collect();
        let merged = merge_ranked(request, &inputs);

        let mut hits = Vec::with_capacity(merged.hits.len());
        for hit in merged.hits {
            let Some((index, _)) = succeeded.get(hit.source) else {
                continue;
            };
            if let Some(document) = index.load_for_search(&hit.id).await {
                hits.push(SearchHit {
                    id: hit.id,
                    document: T::clone(&document),
                    score: hit.score,
                });
            }
        }

        let mut statistics = merged.statistics;
        statistics.execution_time = started.elapsed();
        debug!(
            indices = statistics.indices_queried.len(),
            total = merged.total_count,
            returned = hits.len(),
            elapsed_ms = statistics.execution_time.as_millis() as u64,
            "multi-index search complete"
        );
        SearchResult::page(
            hits,
            merged.total_count,
            request.page_number,
            request.page_size,
            statistics,
        )
    }

    /// Writes the metadata of every registered index
    pub async fn save_all(&self) -> IndexResult<()> {
        let indices: Vec<Arc<SearchIndex<T>>> = {
            let indices = self.indices.read().map_err(|_| poisoned())?;
            indices.values().cloned().collect()
        };
        for index in indices {
            index.save_metadata().await?;
        }
        Ok(())
    }

    /// Opens every index under the root that has a `metadata.json` and is
    /// not registered yet. Returns the IDs that were opened.
    pub async fn load_all(&self) -> IndexResult<Vec<String>> {
        let mut loaded = Vec::new();
        if !storage::exists(&self.root).await {
            return Ok(loaded);
        }

        for dir in storage::list_dirs(&self.root).await? {
            let Some(metadata) = IndexMetadata::load(&dir.join(METADATA_FILE)).await else {
                continue;
            };
            let mut descriptor = metadata.configuration;
            if self.contains(&descriptor.id)? {
                continue;
            }
            descriptor.storage_root = self.root.clone();
            let id = descriptor.id.clone();

            match self.create_index(descriptor).await {
                Ok(_) => loaded.push(id),
                Err(e) => warn!(index_id = %id, error = %e, "failed to load index"),
            }
        }

        loaded.sort();
        info!(root = %self.root.display(), loaded = loaded.len(), "indices loaded");
        Ok(loaded)
    }

    /// Disposes every registered index
    pub async fn dispose_all(&self) -> IndexResult<()> {
        let indices: Vec<Arc<SearchIndex<T>>> = {
            let mut indices = self.indices.write().map_err(|_| poisoned())?;
            indices.drain().map(|(_, index)| index).collect()
        };
        for index in indices {
            index.dispose().await?;
        }
        Ok(())
    }
}
