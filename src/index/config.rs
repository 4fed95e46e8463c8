//! Index configuration
//!
//! `IndexDescriptor` is the serializable identity of an index and is written
//! into `metadata.json`. `IndexConfiguration` adds the parts that cannot be
//! serialized: the field accessor table and the cache tuning.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{IndexError, IndexResult};
use super::fields::{DynamicField, FieldAccessors};
use crate::config::CacheConfig;
use crate::facets::FacetSpec;
use crate::storage::{is_reserved_field_name, ITEMS_DIR};

/// Serializable, immutable identity of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDescriptor {
    pub id: String,
    pub name: String,
    pub storage_root: PathBuf,
    #[serde(default)]
    pub indexed_fields: Vec<String>,
    #[serde(default)]
    pub dynamic_fields: Vec<DynamicField>,
    /// Fields tokenized into the full-text index
    #[serde(default)]
    pub text_fields: Vec<String>,
    /// Full-text synonyms: term -> alternatives
    #[serde(default)]
    pub synonyms: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub facets: Vec<FacetSpec>,
    /// Numeric fields averaged in facet files
    #[serde(default)]
    pub facet_measures: Vec<String>,
    /// 0 means unbounded
    #[serde(default)]
    pub max_items: u64,
    #[serde(default)]
    pub priority: i32,
    pub created_at: DateTime<Utc>,
}

impl IndexDescriptor {
    /// Creates a descriptor with no indexed fields
    pub fn new(id: impl Into<String>, storage_root: impl Into<PathBuf>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            storage_root: storage_root.into(),
            indexed_fields: Vec::new(),
            dynamic_fields: Vec::new(),
            text_fields: Vec::new(),
            synonyms: BTreeMap::new(),
            facets: Vec::new(),
            facet_measures: Vec::new(),
            max_items: 0,
            priority: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexed_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_dynamic_field(mut self, field: DynamicField) -> Self {
        self.dynamic_fields.push(field);
        self
    }

    pub fn with_text_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.text_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_synonyms<I, S>(mut self, term: &str, alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.synonyms.insert(
            term.to_lowercase(),
            alternatives.into_iter().map(|s| s.into().to_lowercase()).collect(),
        );
        self
    }

    pub fn with_facet(mut self, facet: FacetSpec) -> Self {
        self.facets.push(facet);
        self
    }

    pub fn with_facet_measures<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facet_measures.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_max_items(mut self, max_items: u64) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Returns true if `field` has a field index (case-insensitive)
    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexed_fields
            .iter()
            .any(|f| f.eq_ignore_ascii_case(field))
    }

    /// Validate the descriptor
    pub fn validate(&self) -> IndexResult<()> {
        if self.id.trim().is_empty() {
            return Err(IndexError::validation("index id must not be blank"));
        }

        let mut seen = HashSet::new();
        for field in &self.indexed_fields {
            if field.trim().is_empty() {
                return Err(IndexError::validation("indexed field names must not be blank"));
            }
            if is_reserved_field_name(field) {
                return Err(IndexError::validation(format!(
                    "field '{}' collides with the full-text index file",
                    field
                )));
            }
            if !seen.insert(field.to_lowercase()) {
                return Err(IndexError::validation(format!(
                    "field '{}' is indexed more than once",
                    field
                )));
            }
        }

        for dynamic in &self.dynamic_fields {
            if dynamic.name.trim().is_empty() || dynamic.path.trim().is_empty() {
                return Err(IndexError::validation(
                    "dynamic fields need a name and a path",
                ));
            }
        }

        let mut facet_types = HashSet::new();
        for facet in &self.facets {
            facet.validate()?;
            if facet.facet_type.eq_ignore_ascii_case(ITEMS_DIR) {
                return Err(IndexError::validation(format!(
                    "facet type '{}' collides with the document directory",
                    facet.facet_type
                )));
            }
            if !facet_types.insert(facet.facet_type.to_lowercase()) {
                return Err(IndexError::validation(format!(
                    "facet type '{}' is declared more than once",
                    facet.facet_type
                )));
            }
        }

        Ok(())
    }
}

/// Everything needed to open an index over documents of type `T`.
#[derive(Debug, Clone)]
pub struct IndexConfiguration<T> {
    pub descriptor: IndexDescriptor,
    pub accessors: FieldAccessors<T>,
    pub cache: CacheConfig,
}

impl<T> IndexConfiguration<T> {
    pub fn new(descriptor: IndexDescriptor, accessors: FieldAccessors<T>) -> Self {
        Self {
            descriptor,
            accessors,
            cache: CacheConfig::default(),
        }
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}
