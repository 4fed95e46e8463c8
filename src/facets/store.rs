//! Materialized facet files
//!
//! `<root>/<IndexId>/<facetType>/<facetKey>.json` holds the members of one
//! facet value together with measure totals and cross-tabulations against
//! every other facet type. Files are maintained by the same indexing pathway
//! as field indices, and an empty facet value has no file.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::definition::FacetSpec;
use crate::index::{FieldValue, IndexResult};
use crate::storage::{self, FileLocks, IndexLayout};

/// Running sum of one numeric measure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureTotal {
    pub sum: f64,
    pub count: u64,
}

impl MeasureTotal {
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Contents of one facet file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetEntry {
    pub facet_type: String,
    pub key: String,
    pub count: u64,
    pub ids: BTreeSet<String>,
    #[serde(default)]
    pub measures: BTreeMap<String, MeasureTotal>,
    /// other facet type -> key -> number of shared documents
    #[serde(default)]
    pub cross: BTreeMap<String, BTreeMap<String, u64>>,
}

impl FacetEntry {
    pub fn new(facet_type: &str, key: &str) -> Self {
        Self {
            facet_type: facet_type.to_string(),
            key: key.to_string(),
            count: 0,
            ids: BTreeSet::new(),
            measures: BTreeMap::new(),
            cross: BTreeMap::new(),
        }
    }

    /// Average of a measure over the members that have it
    pub fn average(&self, measure: &str) -> Option<f64> {
        self.measures.get(measure).and_then(MeasureTotal::average)
    }

    fn add(&mut self, id: &str, facets: &DocumentFacets) {
        if !self.ids.insert(id.to_string()) {
            return;
        }
        self.count = self.ids.len() as u64;

        for (measure, value) in &facets.measures {
            let total = self.measures.entry(measure.clone()).or_default();
            total.sum += value;
            total.count += 1;
        }
        for (other, keys) in &facets.keys {
            if *other == self.facet_type {
                continue;
            }
            let tab = self.cross.entry(other.clone()).or_default();
            for key in keys {
                *tab.entry(key.clone()).or_default() += 1;
            }
        }
    }

    fn remove(&mut self, id: &str, facets: &DocumentFacets) {
        if !self.ids.remove(id) {
            return;
        }
        self.count = self.ids.len() as u64;

        for (measure, value) in &facets.measures {
            if let Some(total) = self.measures.get_mut(measure) {
                total.sum -= value;
                total.count = total.count.saturating_sub(1);
                if total.count == 0 {
                    self.measures.remove(measure);
                }
            }
        }
        for (other, keys) in &facets.keys {
            if let Some(tab) = self.cross.get_mut(other) {
                for key in keys {
                    if let Some(n) = tab.get_mut(key) {
                        *n = n.saturating_sub(1);
                        if *n == 0 {
                            tab.remove(key);
                        }
                    }
                }
                if tab.is_empty() {
                    self.cross.remove(other);
                }
            }
        }
    }
}

/// Facet keys and measure values extracted from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFacets {
    /// facet type -> keys
    pub keys: BTreeMap<String, BTreeSet<String>>,
    pub measures: BTreeMap<String, f64>,
}

impl DocumentFacets {
    pub fn is_empty(&self) -> bool {
        self.keys.values().all(|k| k.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetChange {
    Add,
    Remove,
}

/// Reads and maintains the facet files of one index.
#[derive(Debug)]
pub struct FacetStore {
    layout: IndexLayout,
    locks: Arc<FileLocks>,
    specs: Vec<FacetSpec>,
    measures: Vec<String>,
}

impl FacetStore {
    pub fn new(
        layout: IndexLayout,
        locks: Arc<FileLocks>,
        specs: Vec<FacetSpec>,
        measures: Vec<String>,
    ) -> Self {
        Self {
            layout,
            locks,
            specs,
            measures,
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.specs.is_empty()
    }

    pub fn facet_types(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.facet_type.clone()).collect()
    }

    /// Extracts facet keys and measures through a field getter
    pub fn extract<F>(&self, get: F) -> DocumentFacets
    where
        F: Fn(&str) -> FieldValue,
    {
        let mut facets = DocumentFacets::default();
        if self.specs.is_empty() {
            return facets;
        }
        for spec in &self.specs {
            let keys = spec.keys_for(&get(&spec.field));
            if !keys.is_empty() {
                facets.keys.insert(spec.facet_type.clone(), keys);
            }
        }
        for measure in &self.measures {
            if let Some(x) = get(measure).as_f64() {
                facets.measures.insert(measure.clone(), x);
            }
        }
        facets
    }

    async fn read_entry(&self, facet_type: &str, key: &str) -> FacetEntry {
        let path = self.layout.facet_path(facet_type, key);
        match storage::read_json::<FacetEntry>(&path).await {
            Ok(Some(entry)) => entry,
            Ok(None) => FacetEntry::new(facet_type, key),
            Err(e) => {
                warn!(facet_type, key, error = %e, "facet file unreadable, starting over");
                FacetEntry::new(facet_type, key)
            }
        }
    }

    async fn write_entry(&self, entry: &FacetEntry) -> IndexResult<()> {
        let path = self.layout.facet_path(&entry.facet_type, &entry.key);
        if entry.ids.is_empty() {
            storage::remove_if_exists(&path).await.map(|_| ())
        } else {
            storage::write_json(&path, entry).await.map(|_| ())
        }
    }

    /// Adds or removes one document from every facet file it belongs to
    pub async fn apply(&self, id: &str, facets: &DocumentFacets, change: FacetChange) -> IndexResult<()> {
        for (facet_type, keys) in &facets.keys {
            for key in keys {
                let path = self.layout.facet_path(facet_type, key);
                let _guard = self.locks.lock(&path).await;

                let mut entry = self.read_entry(facet_type, key).await;
                match change {
                    FacetChange::Add => entry.add(id, facets),
                    FacetChange::Remove => entry.remove(id, facets),
                }
                self.write_entry(&entry).await?;
            }
        }
        Ok(())
    }

    /// Keys present for a facet type, sorted
    pub async fn keys(&self, facet_type: &str) -> IndexResult<Vec<String>> {
        let files = storage::list_files(&self.layout.facet_dir(facet_type)).await?;
        Ok(files
            .iter()
            .filter_map(|p| IndexLayout::document_id_from_path(p))
            .collect())
    }

    pub async fn get(&self, facet_type: &str, key: &str) -> IndexResult<Option<FacetEntry>> {
        storage::read_json(&self.layout.facet_path(facet_type, key)).await
    }

    /// Deletes every facet directory
    pub async fn clear(&self) -> IndexResult<()> {
        for spec in &self.specs {
            storage::remove_dir_if_exists(&self.layout.facet_dir(&spec.facet_type)).await?;
        }
        Ok(())
    }

    /// Recomputes every facet file from scratch
    pub async fn rebuild(&self, documents: &[(String, DocumentFacets)]) -> IndexResult<()> {
        self.clear().await?;

        let mut entries: BTreeMap<(String, String), FacetEntry> = BTreeMap::new();
        for (id, facets) in documents {
            for (facet_type, keys) in &facets.keys {
                for key in keys {
                    entries
                        .entry((facet_type.clone(), key.clone()))
                        .or_insert_with(|| FacetEntry::new(facet_type, key))
                        .add(id, facets);
                }
            }
        }

        for entry in entries.values() {
            self.write_entry(entry).await?;
        }
        debug!(files = entries.len(), "facet files rebuilt");
        Ok(())
    }
}
