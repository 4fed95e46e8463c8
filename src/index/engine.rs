//! `SearchIndex`: one named index over documents of type `T`
//!
//! # Mutation pathway
//!
//! document file -> field indices -> full-text postings -> facet files ->
//! cache -> counters -> notification
//!
//! A failure after the document file was touched rolls the index back to
//! its previous state before the error surfaces.
//!
//! # Locking
//!
//! - Mutations of the same document ID are serialized by a per-ID lock
//! - Every file has its own writer lock (see `storage::FileLocks`)
//! - `rebuild`, `clear`, `load_from_file` and `dispose` take the index gate
//!   exclusively; everything else shares it

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{debug, info, warn};

use super::config::{IndexConfiguration, IndexDescriptor};
use super::errors::{IndexError, IndexResult};
use super::field_index::{FieldIndex, FieldIndexStore};
use super::fields::FieldResolver;
use super::value::DataType;
use crate::cache::{CacheStats, CacheSweeper, Sweepable, TtlCache};
use crate::facets::{DocumentFacets, FacetChange, FacetEntry, FacetStore};
use crate::fulltext::FullTextIndex;
use crate::observability::{
    IndexNotification, IndexStatus, MetricsSnapshot, NotificationReceiver, Notifier,
    PerformanceMetrics,
};
use crate::query::{QueryExecutor, RankedIds, SearchRequest, SearchResult};
use crate::storage::{self, validate_document_id, DocumentStore, FileLocks, IndexLayout, IndexMetadata};

/// Anything that can be stored in an index.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Document for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Point-in-time view of an index's health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatistics {
    pub index_id: String,
    pub status: IndexStatus,
    pub metrics: MetricsSnapshot,
    pub document_cache: CacheStats,
    pub field_cache: CacheStats,
    pub full_text_words: usize,
}

/// Portable copy of an index's derived state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    pub configuration: IndexDescriptor,
    pub metadata: IndexMetadata,
    /// lowercased field name -> index
    pub field_indices: BTreeMap<String, FieldIndex>,
}

/// Everything one document contributes to the derived files.
#[derive(Debug, Default)]
struct IndexEntries {
    fields: Vec<(String, String)>,
    text: Option<String>,
    facets: DocumentFacets,
}

pub struct SearchIndex<T: Document> {
    descriptor: IndexDescriptor,
    layout: IndexLayout,
    resolver: FieldResolver<T>,
    locks: Arc<FileLocks>,
    documents: DocumentStore,
    document_cache: Arc<TtlCache<String, Arc<T>>>,
    fields: FieldIndexStore,
    text: FullTextIndex,
    facets: FacetStore,
    metrics: PerformanceMetrics,
    notifier: Notifier,
    status: RwLock<IndexStatus>,
    gate: AsyncRwLock<()>,
    sweeper: Mutex<Option<CacheSweeper>>,
}

impl<T: Document> std::fmt::Debug for SearchIndex<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("id", &self.descriptor.id)
            .field("dir", &self.layout.dir())
            .field("status", &self.status())
            .finish()
    }
}

impl<T: Document> SearchIndex<T> {
    /// Opens (or creates) the index described by `configuration`.
    ///
    /// Counters come from `metadata.json` when it was written by a clean
    /// shutdown; otherwise `items/` is scanned.
    pub async fn open(configuration: IndexConfiguration<T>) -> IndexResult<Self> {
        let IndexConfiguration {
            descriptor,
            accessors,
            cache,
        } = configuration;
        descriptor.validate()?;
        cache.validate()?;

        let index_id = descriptor.id.clone();
        let init = |e: IndexError| IndexError::Initialization(format!("{}: {}", index_id, e));

        let layout = IndexLayout::new(&descriptor.storage_root, &descriptor.id);
        tokio::fs::create_dir_all(layout.items_dir())
            .await
            .map_err(|e| init(IndexError::io(&layout.items_dir(), e)))?;

        let locks = Arc::new(FileLocks::new());
        let documents = DocumentStore::new(layout.clone(), Arc::clone(&locks));

        let (item_count, index_size) = match IndexMetadata::load(&layout.metadata_path()).await {
            Some(meta) if meta.clean_shutdown && meta.configuration.id == descriptor.id => {
                (meta.item_count, meta.index_size)
            }
            found => {
                if found.is_some() {
                    info!(index_id = %descriptor.id, "previous session did not shut down cleanly, scanning items");
                }
                documents.scan_totals().await.map_err(&init)?
            }
        };

        let document_cache = Arc::new(TtlCache::new(cache.max_documents, cache.ttl()));
        let fields = FieldIndexStore::new(
            layout.clone(),
            Arc::clone(&locks),
            cache.max_field_indices,
            cache.ttl(),
        );
        let text = FullTextIndex::open(&layout, Arc::clone(&locks), descriptor.synonyms.clone()).await;
        let facets = FacetStore::new(
            layout.clone(),
            Arc::clone(&locks),
            descriptor.facets.clone(),
            descriptor.facet_measures.clone(),
        );

        let sweepables: Vec<Arc<dyn Sweepable>> = vec![
            Arc::clone(&document_cache) as Arc<dyn Sweepable>,
            fields.sweepable(),
        ];
        let sweeper = CacheSweeper::spawn(descriptor.id.clone(), cache.sweep_interval(), sweepables);

        let index = Self {
            resolver: FieldResolver::new(accessors, &descriptor.dynamic_fields),
            descriptor,
            layout,
            locks,
            documents,
            document_cache,
            fields,
            text,
            facets,
            metrics: PerformanceMetrics::with_state(item_count, index_size),
            notifier: Notifier::new(),
            status: RwLock::new(IndexStatus::Initializing),
            gate: AsyncRwLock::new(()),
            sweeper: Mutex::new(Some(sweeper)),
        };

        index.write_metadata(false).await.map_err(&init)?;
        index.set_status(IndexStatus::Active);
        info!(
            index_id = %index.descriptor.id,
            items = item_count,
            bytes = index_size,
            "index opened"
        );
        Ok(index)
    }

    // ---------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    /// The index directory
    pub fn dir(&self) -> &Path {
        self.layout.dir()
    }

    pub fn status(&self) -> IndexStatus {
        self.status
            .read()
            .map(|s| *s)
            .unwrap_or(IndexStatus::Error)
    }

    /// Current item count
    pub fn count(&self) -> u64 {
        self.metrics.item_count()
    }

    pub fn subscribe(&self) -> NotificationReceiver {
        self.notifier.subscribe()
    }

    pub fn get_statistics(&self) -> IndexStatistics {
        IndexStatistics {
            index_id: self.descriptor.id.clone(),
            status: self.status(),
            metrics: self.metrics.snapshot(),
            document_cache: self.document_cache.stats(),
            field_cache: self.fields.cache_stats(),
            full_text_words: self.text.word_count(),
        }
    }

    // ---------------------------------------------------------------
    // Internal helpers
    // ---------------------------------------------------------------

    fn set_status(&self, to: IndexStatus) {
        let from = match self.status.write() {
            Ok(mut status) => std::mem::replace(&mut *status, to),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), to),
        };
        if from != to {
            info!(index_id = %self.descriptor.id, from = %from, to = %to, "index status changed");
            self.notifier.publish(IndexNotification::StatusChanged {
                index_id: self.descriptor.id.clone(),
                from,
                to,
                at: chrono::Utc::now(),
            });
        }
    }

    fn ensure_open(&self) -> IndexResult<()> {
        if self.status().is_usable() {
            Ok(())
        } else {
            Err(IndexError::Disposed(self.descriptor.id.clone()))
        }
    }

    /// Counts and publishes a failure, then hands it back
    fn report<R>(&self, result: IndexResult<R>) -> IndexResult<R> {
        if let Err(e) = &result {
            self.notify_error(e);
        }
        result
    }

    fn notify_error(&self, e: &IndexError) {
        self.metrics.increment_errors();
        self.notifier
            .publish(IndexNotification::error(&self.descriptor.id, e));
    }

    fn mutation_lock_path(&self, id: &str) -> PathBuf {
        self.layout.document_path(id).with_extension("lock")
    }

    async fn write_metadata(&self, clean_shutdown: bool) -> IndexResult<()> {
        IndexMetadata::new(
            self.descriptor.clone(),
            self.metrics.item_count(),
            self.metrics.index_size(),
        )
        .with_clean_shutdown(clean_shutdown)
        .save(&self.layout.metadata_path())
        .await
    }

    fn entries_for(&self, document: &T) -> IndexEntries {
        let view = self.resolver.view(document);

        let fields = self
            .descriptor
            .indexed_fields
            .iter()
            .filter_map(|field| view.get(field).to_key().map(|key| (field.clone(), key)))
            .collect();

        let text = if self.descriptor.text_fields.is_empty() {
            None
        } else {
            let parts: Vec<String> = self
                .descriptor
                .text_fields
                .iter()
                .flat_map(|field| {
                    view.get(field)
                        .elements()
                        .into_iter()
                        .filter_map(|v| v.to_key())
                        .collect::<Vec<_>>()
                })
                .collect();
            Some(parts.join(" "))
        };

        let facets = self.facets.extract(|field| view.get(field));

        IndexEntries {
            fields,
            text,
            facets,
        }
    }

    /// Entries covering every derived file, for documents that cannot be read
    fn entries_for_unreadable(&self) -> IndexEntries {
        IndexEntries {
            fields: self
                .descriptor
                .indexed_fields
                .iter()
                .map(|f| (f.clone(), String::new()))
                .collect(),
            text: (!self.descriptor.text_fields.is_empty()).then(String::new),
            facets: DocumentFacets::default(),
        }
    }

    async fn try_apply(&self, id: &str, entries: &IndexEntries) -> IndexResult<()> {
        for (field, key) in &entries.fields {
            self.fields
                .update(field, |index| {
                    index.remove_id(id);
                    index.insert(key.as_str(), id);
                })
                .await?;
        }
        if let Some(text) = &entries.text {
            self.text.index_document(id, text).await?;
        }
        if !entries.facets.is_empty() {
            self.facets.apply(id, &entries.facets, FacetChange::Add).await?;
        }
        Ok(())
    }

    /// Applies entries; on failure whatever was applied is removed again
    async fn apply_entries(&self, id: &str, entries: &IndexEntries) -> IndexResult<()> {
        if let Err(e) = self.try_apply(id, entries).await {
            if let Err(undo) = self.remove_entries(id, entries).await {
                warn!(index_id = %self.descriptor.id, document_id = id, error = %undo, "rollback of index entries failed");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Removes entries from every derived file, continuing past failures.
    /// Returns the first error.
    async fn remove_entries(&self, id: &str, entries: &IndexEntries) -> IndexResult<()> {
        let mut first_error = None;
        for (field, _) in &entries.fields {
            let removed = self
                .fields
                .update(field, |index| {
                    index.remove_id(id);
                })
                .await;
            if let Err(e) = removed {
                first_error.get_or_insert(e);
            }
        }
        if entries.text.is_some() {
            if let Err(e) = self.text.remove_document(id).await {
                first_error.get_or_insert(e);
            }
        }
        if !entries.facets.is_empty() {
            let removed = self
                .facets
                .apply(id, &entries.facets, FacetChange::Remove)
                .await;
            if let Err(e) = removed {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Puts back a document and its entries after a failed update
    async fn restore(&self, id: &str, old: &T, old_entries: &IndexEntries) {
        if let Err(e) = self.documents.write(id, old).await {
            warn!(index_id = %self.descriptor.id, document_id = id, error = %e, "failed to restore document");
        }
        if let Err(e) = self.try_apply(id, old_entries).await {
            warn!(index_id = %self.descriptor.id, document_id = id, error = %e, "failed to restore index entries");
        }
        self.document_cache.invalidate(id);
    }

    /// Cache first, then disk. Populates the cache on a cold read.
    async fn read_document(&self, id: &str) -> IndexResult<Option<Arc<T>>> {
        if let Some(document) = self.document_cache.get(id) {
            return Ok(Some(document));
        }
        let generation = self.document_cache.generation();
        match self.documents.read::<T>(id).await? {
            Some(document) => {
                let document = Arc::new(document);
                self.document_cache
                    .put_if_unchanged(id.to_string(), Arc::clone(&document), generation);
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------
    // Query support
    // ---------------------------------------------------------------

    /// Loads a document for query evaluation; unreadable means absent
    pub(crate) async fn load_for_search(&self, id: &str) -> Option<Arc<T>> {
        match self.read_document(id).await {
            Ok(document) => document,
            Err(e) => {
                warn!(index_id = %self.descriptor.id, document_id = id, error = %e, "skipping unreadable document");
                None
            }
        }
    }

    pub(crate) async fn stored_ids(&self) -> IndexResult<BTreeSet<String>> {
        Ok(self.documents.list_ids().await?.into_iter().collect())
    }

    pub(crate) fn is_indexed(&self, field: &str) -> bool {
        self.descriptor.is_indexed(field)
    }

    pub(crate) fn declared_type(&self, field: &str) -> DataType {
        self.resolver.declared_type(field)
    }

    pub(crate) async fn field_index(&self, field: &str) -> Arc<FieldIndex> {
        self.fields.load(field).await
    }

    pub(crate) fn field_key(&self, document: &T, field: &str) -> Option<String> {
        self.resolver.resolve(document, field).to_key()
    }

    pub(crate) fn text_scores(&self, query: &str) -> IndexResult<HashMap<String, f64>> {
        self.text.search(query)
    }

    // ---------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------

    /// Adds a new document.
    pub async fn add(&self, id: &str, document: T) -> IndexResult<()> {
        let result = self.add_inner(id, document).await;
        self.report(result)
    }

    async fn add_inner(&self, id: &str, document: T) -> IndexResult<()> {
        self.ensure_open()?;
        validate_document_id(id)?;
        let _gate = self.gate.read().await;
        let _op = self.locks.lock(&self.mutation_lock_path(id)).await;

        let max_items = self.descriptor.max_items;
        if max_items > 0 && self.metrics.item_count() >= max_items {
            return Err(IndexError::validation(format!(
                "index '{}' is full ({} items)",
                self.descriptor.id, max_items
            )));
        }
        if self.documents.exists(id).await {
            return Err(IndexError::DuplicateKey(id.to_string()));
        }

        let entries = self.entries_for(&document);
        let size = self.documents.write(id, &document).await?;
        if let Err(e) = self.apply_entries(id, &entries).await {
            if let Err(cleanup) = self.documents.delete(id).await {
                warn!(index_id = %self.descriptor.id, document_id = id, error = %cleanup, "failed to delete document after indexing failure");
            }
            return Err(e);
        }

        self.document_cache.put(id.to_string(), Arc::new(document));
        self.metrics.increment_adds();
        self.metrics.item_added();
        self.metrics.adjust_size(size as i64);
        debug!(index_id = %self.descriptor.id, document_id = id, bytes = size, "document added");

        self.notifier.publish(IndexNotification::ItemAdded {
            index_id: self.descriptor.id.clone(),
            document_id: id.to_string(),
            at: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Replaces an existing document.
    pub async fn update(&self, id: &str, document: T) -> IndexResult<()> {
        let result = self.update_inner(id, document).await;
        self.report(result)
    }

    async fn update_inner(&self, id: &str, document: T) -> IndexResult<()> {
        self.ensure_open()?;
        validate_document_id(id)?;
        let _gate = self.gate.read().await;
        let _op = self.locks.lock(&self.mutation_lock_path(id)).await;

        let old = self
            .read_document(id)
            .await?
            .ok_or_else(|| IndexError::ItemNotFound(id.to_string()))?;
        let old_size = self.documents.size_of(id).await.unwrap_or(0);
        let old_entries = self.entries_for(&old);
        let new_entries = self.entries_for(&document);

        if let Err(e) = self.remove_entries(id, &old_entries).await {
            self.restore(id, &old, &old_entries).await;
            return Err(e);
        }
        let size = match self.documents.write(id, &document).await {
            Ok(size) => size,
            Err(e) => {
                self.restore(id, &old, &old_entries).await;
                return Err(e);
            }
        };
        if let Err(e) = self.apply_entries(id, &new_entries).await {
            self.restore(id, &old, &old_entries).await;
            return Err(e);
        }

        self.document_cache.put(id.to_string(), Arc::new(document));
        self.metrics.increment_updates();
        self.metrics.adjust_size(size as i64 - old_size as i64);
        debug!(index_id = %self.descriptor.id, document_id = id, bytes = size, "document updated");

        self.notifier.publish(IndexNotification::ItemUpdated {
            index_id: self.descriptor.id.clone(),
            document_id: id.to_string(),
            at: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Removes a document and every entry derived from it.
    pub async fn remove(&self, id: &str) -> IndexResult<()> {
        let result = self.remove_inner(id).await;
        self.report(result)
    }

    async fn remove_inner(&self, id: &str) -> IndexResult<()> {
        self.ensure_open()?;
        validate_document_id(id)?;
        let _gate = self.gate.read().await;
        let _op = self.locks.lock(&self.mutation_lock_path(id)).await;

        if !self.documents.exists(id).await {
            self.document_cache.invalidate(id);
            return Err(IndexError::ItemNotFound(id.to_string()));
        }

        let entries = match self.read_document(id).await {
            Ok(Some(old)) => self.entries_for(&old),
            Ok(None) => return Err(IndexError::ItemNotFound(id.to_string())),
            Err(e) => {
                warn!(index_id = %self.descriptor.id, document_id = id, error = %e, "removing unreadable document");
                self.entries_for_unreadable()
            }
        };
        let size = self.documents.size_of(id).await.unwrap_or(0);

        self.remove_entries(id, &entries).await?;
        if let Err(e) = self.documents.delete(id).await {
            if let Err(undo) = self.try_apply(id, &entries).await {
                warn!(index_id = %self.descriptor.id, document_id = id, error = %undo, "failed to restore index entries");
            }
            return Err(e);
        }

        self.document_cache.invalidate(id);
        self.metrics.increment_removes();
        self.metrics.item_removed();
        self.metrics.adjust_size(-(size as i64));
        debug!(index_id = %self.descriptor.id, document_id = id, "document removed");

        self.notifier.publish(IndexNotification::ItemRemoved {
            index_id: self.descriptor.id.clone(),
            document_id: id.to_string(),
            at: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Returns true if the document exists. Never deserializes.
    pub async fn exists(&self, id: &str) -> IndexResult<bool> {
        self.report(self.ensure_open())?;
        if self.document_cache.contains(id) {
            return Ok(true);
        }
        Ok(self.documents.exists(id).await)
    }

    /// Returns a copy of the document, if present.
    pub async fn get(&self, id: &str) -> IndexResult<Option<T>> {
        let result = self.get_inner(id).await;
        self.report(result)
    }

    async fn get_inner(&self, id: &str) -> IndexResult<Option<T>> {
        self.ensure_open()?;
        validate_document_id(id)?;
        Ok(self.read_document(id).await?.map(|d| T::clone(&d)))
    }

    /// Every stored document ID, sorted
    pub async fn all_ids(&self) -> IndexResult<Vec<String>> {
        self.report(self.ensure_open())?;
        let ids = self.documents.list_ids().await;
        self.report(ids)
    }

    // ---------------------------------------------------------------
    // Search
    // ---------------------------------------------------------------

    /// Runs a query. Failures come back as `success == false`.
    pub async fn search(&self, request: &SearchRequest) -> SearchResult<T> {
        if let Err(e) = self.report(self.ensure_open()) {
            return SearchResult::failure(e.to_string(), request.page_number, request.page_size);
        }

        let _gate = self.gate.read().await;
        self.metrics.increment_searches();

        match QueryExecutor::new(self).execute(request).await {
            Ok(result) => result,
            Err(e) => {
                let message = self.search_failed(e).to_string();
                SearchResult::failure(message, request.page_number, request.page_size)
            }
        }
    }

    /// Ordered matches without documents, for merging across indices
    pub(crate) async fn rank(&self, request: &SearchRequest) -> IndexResult<RankedIds> {
        self.report(self.ensure_open())?;
        let _gate = self.gate.read().await;
        self.metrics.increment_searches();

        QueryExecutor::new(self)
            .rank(request)
            .await
            .map_err(|e| self.search_failed(e))
    }

    /// Wraps a query failure as a search error and reports it
    fn search_failed(&self, e: IndexError) -> IndexError {
        let e = match e {
            IndexError::Search(_) => e,
            other => IndexError::Search(other.to_string()),
        };
        warn!(index_id = %self.descriptor.id, error = %e, "search failed");
        self.notify_error(&e);
        e
    }

    /// Completions from the full-text vocabulary
    pub fn suggest(&self, prefix: &str, limit: usize) -> IndexResult<Vec<String>> {
        self.report(self.ensure_open())?;
        self.report(self.text.suggest(prefix, limit))
    }

    /// Keys present for a facet type
    pub async fn facet_keys(&self, facet_type: &str) -> IndexResult<Vec<String>> {
        self.report(self.ensure_open())?;
        let keys = self.facets.keys(facet_type).await;
        self.report(keys)
    }

    /// Contents of one facet file
    pub async fn facet(&self, facet_type: &str, key: &str) -> IndexResult<Option<FacetEntry>> {
        self.report(self.ensure_open())?;
        let entry = self.facets.get(facet_type, key).await;
        self.report(entry)
    }

    // ---------------------------------------------------------------
    // Maintenance
    // ---------------------------------------------------------------

    /// Recomputes every derived file from `items/`.
    ///
    /// Two successive rebuilds produce identical files.
    pub async fn rebuild(&self) -> IndexResult<()> {
        self.report(self.ensure_open())?;
        let _gate = self.gate.write().await;
        self.set_status(IndexStatus::Rebuilding);

        let result = match self.rebuild_inner().await {
            Ok(count) => {
                self.metrics.increment_rebuilds();
                self.set_status(IndexStatus::Active);
                info!(index_id = %self.descriptor.id, items = count, "index rebuilt");
                Ok(())
            }
            Err(e) => {
                self.set_status(IndexStatus::Error);
                Err(IndexError::Rebuild(e.to_string()))
            }
        };
        self.report(result)
    }

    async fn rebuild_inner(&self) -> IndexResult<u64> {
        self.document_cache.clear();
        self.fields.clear_cache();

        let mut field_indices: BTreeMap<String, FieldIndex> = self
            .descriptor
            .indexed_fields
            .iter()
            .map(|f| (f.clone(), FieldIndex::new()))
            .collect();
        let mut texts = Vec::new();
        let mut facets = Vec::new();
        let mut count = 0u64;
        let mut bytes = 0u64;

        for id in self.documents.list_ids().await? {
            let document = match self.documents.read::<T>(&id).await {
                Ok(Some(document)) => document,
                Ok(None) => continue,
                Err(e) => {
                    warn!(index_id = %self.descriptor.id, document_id = %id, error = %e, "rebuild skipping unreadable document");
                    continue;
                }
            };

            let entries = self.entries_for(&document);
            for (field, key) in entries.fields {
                if let Some(index) = field_indices.get_mut(&field) {
                    index.insert(key, id.as_str());
                }
            }
            if let Some(text) = entries.text {
                texts.push((id.clone(), text));
            }
            if !entries.facets.is_empty() {
                facets.push((id.clone(), entries.facets));
            }

            count += 1;
            bytes += self.documents.size_of(&id).await.unwrap_or(0);
        }

        for (field, index) in field_indices {
            self.fields.replace(&field, index).await?;
        }
        if self.descriptor.text_fields.is_empty() {
            self.text.clear().await?;
        } else {
            self.text.rebuild(&texts).await?;
        }
        self.facets.rebuild(&facets).await?;

        self.metrics.reset_state(count, bytes);
        self.write_metadata(false).await?;
        Ok(count)
    }

    /// Deletes every document and derived file.
    pub async fn clear(&self) -> IndexResult<()> {
        self.report(self.ensure_open())?;
        let _gate = self.gate.write().await;
        let result = self.clear_inner().await;
        self.report(result)
    }

    async fn clear_inner(&self) -> IndexResult<()> {
        self.documents.clear().await?;
        for field in &self.descriptor.indexed_fields {
            self.fields.delete(field).await?;
        }
        self.text.clear().await?;
        self.facets.clear().await?;
        self.document_cache.clear();
        self.fields.clear_cache();

        self.metrics.reset_state(0, 0);
        self.write_metadata(false).await?;
        info!(index_id = %self.descriptor.id, "index cleared");
        Ok(())
    }

    /// Persists the current counters to `metadata.json`
    pub async fn save_metadata(&self) -> IndexResult<()> {
        self.report(self.ensure_open())?;
        let result = self.write_metadata(false).await;
        self.report(result)
    }

    /// Writes configuration, metadata and every field index to `path`
    pub async fn save_to_file(&self, path: &Path) -> IndexResult<()> {
        self.report(self.ensure_open())?;
        let _gate = self.gate.read().await;

        let mut field_indices = BTreeMap::new();
        for field in &self.descriptor.indexed_fields {
            let index = self.fields.load(field).await;
            field_indices.insert(field.to_lowercase(), FieldIndex::clone(&index));
        }
        let snapshot = IndexSnapshot {
            configuration: self.descriptor.clone(),
            metadata: IndexMetadata::new(
                self.descriptor.clone(),
                self.metrics.item_count(),
                self.metrics.index_size(),
            ),
            field_indices,
        };
        let written = storage::write_json(path, &snapshot).await;
        if written.is_ok() {
            info!(index_id = %self.descriptor.id, path = %path.display(), "index snapshot saved");
        }
        self.report(written).map(|_| ())
    }

    /// Restores field indices from a snapshot written by `save_to_file`.
    ///
    /// Failure leaves the index in `Error` status.
    pub async fn load_from_file(&self, path: &Path) -> IndexResult<()> {
        self.report(self.ensure_open())?;
        let _gate = self.gate.write().await;

        let result = self.load_snapshot(path).await;
        match &result {
            Ok(()) => {
                self.set_status(IndexStatus::Active);
                info!(index_id = %self.descriptor.id, path = %path.display(), "index snapshot loaded");
            }
            Err(_) => self.set_status(IndexStatus::Error),
        }
        self.report(result)
    }

    async fn load_snapshot(&self, path: &Path) -> IndexResult<()> {
        let snapshot: IndexSnapshot = storage::read_json(path)
            .await?
            .ok_or_else(|| IndexError::corrupt(path, "snapshot not found"))?;

        if snapshot.configuration.id != self.descriptor.id {
            return Err(IndexError::validation(format!(
                "snapshot belongs to index '{}', not '{}'",
                snapshot.configuration.id, self.descriptor.id
            )));
        }

        for field in &self.descriptor.indexed_fields {
            let index = snapshot
                .field_indices
                .get(&field.to_lowercase())
                .cloned()
                .unwrap_or_default();
            self.fields.replace(field, index).await?;
        }

        self.document_cache.clear();
        self.fields.clear_cache();

        let (count, bytes) = self.documents.scan_totals().await?;
        self.metrics.reset_state(count, bytes);
        self.write_metadata(false).await
    }

    /// Stops background work and marks the metadata as cleanly shut down.
    ///
    /// Every later operation fails with `Disposed`.
    pub async fn dispose(&self) -> IndexResult<()> {
        if self.status() == IndexStatus::Disposed {
            return Ok(());
        }
        let _gate = self.gate.write().await;

        let sweeper = match self.sweeper.lock() {
            Ok(mut sweeper) => sweeper.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(sweeper) = sweeper {
            sweeper.shutdown().await;
        }

        let result = self
            .write_metadata(true)
            .await
            .map_err(|e| IndexError::Dispose(format!("{}: {}", self.descriptor.id, e)));

        self.document_cache.clear();
        self.fields.clear_cache();
        self.set_status(IndexStatus::Disposed);
        info!(index_id = %self.descriptor.id, "index disposed");
        self.report(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{FieldAccessors, FieldValue};
    use crate::query::SearchCriterion;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Property {
        city: String,
        price: f64,
        title: String,
    }

    fn property(city: &str, price: f64, title: &str) -> Property {
        Property {
            city: city.to_string(),
            price,
            title: title.to_string(),
        }
    }

    fn configuration(temp: &TempDir) -> IndexConfiguration<Property> {
        let descriptor = IndexDescriptor::new("Properties", temp.path())
            .with_fields(["city", "price"])
            .with_text_fields(["title"]);
        let accessors = FieldAccessors::new()
            .with("city", |p: &Property| FieldValue::from(p.city.as_str()))
            .with("price", |p: &Property| FieldValue::from(p.price));
        IndexConfiguration::new(descriptor, accessors)
    }

    async fn open(temp: &TempDir) -> SearchIndex<Property> {
        SearchIndex::open(configuration(temp)).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_layout() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;

        assert_eq!(index.status(), IndexStatus::Active);
        assert!(temp.path().join("Properties").join("items").is_dir());
        assert!(temp.path().join("Properties").join("metadata.json").is_file());
        assert_eq!(index.count(), 0);
    }

    #[tokio::test]
    async fn test_add_get_and_duplicate() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;

        index.add("p1", property("Aden", 100.0, "Sea view flat")).await.unwrap();
        assert_eq!(index.get("p1").await.unwrap().unwrap().city, "Aden");
        assert!(index.exists("p1").await.unwrap());
        assert_eq!(index.count(), 1);

        let err = index
            .add("p1", property("Sanaa", 50.0, "Old town room"))
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey(_)));
        assert_eq!(index.get("p1").await.unwrap().unwrap().city, "Aden");
        assert_eq!(index.get_statistics().metrics.errors, 1);
    }

    #[tokio::test]
    async fn test_update_moves_field_key() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;

        index.add("p1", property("Aden", 100.0, "Flat")).await.unwrap();
        index.update("p1", property("Sanaa", 100.0, "Flat")).await.unwrap();

        let cities = index.field_index("city").await;
        assert!(cities.lookup_eq("Aden").is_none());
        assert!(cities.lookup_eq("Sanaa").unwrap().contains("p1"));
        assert_eq!(index.count(), 1);

        let err = index.update("p9", property("Aden", 1.0, "x")).await.unwrap_err();
        assert!(matches!(err, IndexError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_cleans_entries() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;

        index.add("p1", property("Aden", 100.0, "Garden villa")).await.unwrap();
        index.remove("p1").await.unwrap();

        assert!(index.get("p1").await.unwrap().is_none());
        assert!(index.field_index("city").await.is_empty());
        assert!(index.text_scores("garden").unwrap().is_empty());
        assert_eq!(index.count(), 0);

        let err = index.remove("p1").await.unwrap_err();
        assert!(matches!(err, IndexError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_id_rejected() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;

        let err = index.add("  ", property("Aden", 1.0, "x")).await.unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));
    }

    #[tokio::test]
    async fn test_max_items() {
        let temp = TempDir::new().unwrap();
        let mut config = configuration(&temp);
        config.descriptor = config.descriptor.with_max_items(1);
        let index = SearchIndex::open(config).await.unwrap();

        index.add("p1", property("Aden", 1.0, "x")).await.unwrap();
        let err = index.add("p2", property("Aden", 1.0, "x")).await.unwrap_err();
        assert!(matches!(err, IndexError::Validation(_)));
    }

    #[tokio::test]
    async fn test_notifications() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        let mut rx = index.subscribe();

        index.add("p1", property("Aden", 1.0, "x")).await.unwrap();
        index.remove("p1").await.unwrap();

        assert!(matches!(rx.recv().await, Some(IndexNotification::ItemAdded { .. })));
        assert!(matches!(rx.recv().await, Some(IndexNotification::ItemRemoved { .. })));
    }

    #[tokio::test]
    async fn test_rebuild_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        index.add("p1", property("Aden", 100.0, "Sea view")).await.unwrap();
        index.add("p2", property("Sanaa", 50.0, "Old town")).await.unwrap();

        index.rebuild().await.unwrap();
        let dir = temp.path().join("Properties");
        let first_city = std::fs::read(dir.join("city_index.json")).unwrap();
        let first_text = std::fs::read(dir.join("fulltext_index.json")).unwrap();

        index.rebuild().await.unwrap();
        assert_eq!(std::fs::read(dir.join("city_index.json")).unwrap(), first_city);
        assert_eq!(std::fs::read(dir.join("fulltext_index.json")).unwrap(), first_text);
        assert_eq!(index.count(), 2);
        assert_eq!(index.status(), IndexStatus::Active);
        assert_eq!(index.get_statistics().metrics.rebuilds, 2);
    }

    #[tokio::test]
    async fn test_rebuild_recovers_missing_field_index() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        index.add("p1", property("Aden", 100.0, "x")).await.unwrap();

        std::fs::remove_file(temp.path().join("Properties").join("city_index.json")).unwrap();
        index.rebuild().await.unwrap();

        let result = index
            .search(&SearchRequest::new().filter(SearchCriterion::eq("city", "Aden")))
            .await;
        assert_eq!(result.ids(), vec!["p1"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        index.add("p1", property("Aden", 100.0, "x")).await.unwrap();

        index.clear().await.unwrap();
        assert_eq!(index.count(), 0);
        assert!(index.all_ids().await.unwrap().is_empty());
        assert!(index.field_index("city").await.is_empty());
    }

    #[tokio::test]
    async fn test_dispose_then_reopen() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        index.add("p1", property("Aden", 100.0, "x")).await.unwrap();
        index.dispose().await.unwrap();
        index.dispose().await.unwrap();

        let err = index.get("p1").await.unwrap_err();
        assert!(matches!(err, IndexError::Disposed(_)));
        let result = index.search(&SearchRequest::new()).await;
        assert!(!result.success);

        let meta = IndexMetadata::load(&temp.path().join("Properties").join("metadata.json"))
            .await
            .unwrap();
        assert!(meta.clean_shutdown);
        assert_eq!(meta.item_count, 1);

        let reopened = open(&temp).await;
        assert_eq!(reopened.count(), 1);
        assert_eq!(reopened.get("p1").await.unwrap().unwrap().city, "Aden");
    }

    #[tokio::test]
    async fn test_unclean_shutdown_rescans() {
        let temp = TempDir::new().unwrap();
        {
            let index = open(&temp).await;
            index.add("p1", property("Aden", 1.0, "x")).await.unwrap();
            index.add("p2", property("Aden", 2.0, "y")).await.unwrap();
        }
        let reopened = open(&temp).await;
        assert_eq!(reopened.count(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        index.add("p1", property("Aden", 100.0, "x")).await.unwrap();

        let snapshot = temp.path().join("snapshot.json");
        index.save_to_file(&snapshot).await.unwrap();

        std::fs::remove_file(temp.path().join("Properties").join("city_index.json")).unwrap();
        index.load_from_file(&snapshot).await.unwrap();
        assert!(index
            .field_index("city")
            .await
            .lookup_eq("Aden")
            .unwrap()
            .contains("p1"));

        let err = index
            .load_from_file(&temp.path().join("missing.json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::index::ErrorKind::FileOperation);
        assert_eq!(index.status(), IndexStatus::Error);
    }
}
