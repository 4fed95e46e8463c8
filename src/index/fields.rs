//! Field resolution without reflection
//!
//! A field is resolved in this order:
//! 1. the accessor table supplied when the index was configured
//! 2. a dynamic field descriptor (dot path into the serialized document)
//! 3. a case-insensitive top-level key of the serialized document
//!
//! All name matching is case-insensitive.

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::{DataType, FieldValue};

/// Getter for one field of `T`
pub type Accessor<T> = Arc<dyn Fn(&T) -> FieldValue + Send + Sync>;

/// Explicit field-name -> getter table.
pub struct FieldAccessors<T> {
    accessors: HashMap<String, Accessor<T>>,
}

impl<T> FieldAccessors<T> {
    /// Empty table; every field falls back to the serialized document
    pub fn new() -> Self {
        Self {
            accessors: HashMap::new(),
        }
    }

    /// Builder-style registration
    pub fn with<F>(mut self, name: &str, getter: F) -> Self
    where
        F: Fn(&T) -> FieldValue + Send + Sync + 'static,
    {
        self.insert(name, getter);
        self
    }

    /// Registers a getter under a case-insensitive name
    pub fn insert<F>(&mut self, name: &str, getter: F)
    where
        F: Fn(&T) -> FieldValue + Send + Sync + 'static,
    {
        self.accessors.insert(name.to_lowercase(), Arc::new(getter));
    }

    pub fn get(&self, name: &str) -> Option<&Accessor<T>> {
        self.accessors.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, lowercased and sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.accessors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl<T> Default for FieldAccessors<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FieldAccessors<T> {
    fn clone(&self) -> Self {
        Self {
            accessors: self.accessors.clone(),
        }
    }
}

impl<T> fmt::Debug for FieldAccessors<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldAccessors")
            .field("fields", &self.names())
            .finish()
    }
}

/// A field located by a path into the serialized document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicField {
    /// Name used in criteria and index files
    pub name: String,
    /// Dot-separated path, e.g. `address.city` or `units.0.price`
    pub path: String,
    #[serde(default)]
    pub data_type: DataType,
}

impl DynamicField {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            data_type: DataType::Auto,
        }
    }

    pub fn with_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }
}

/// Looks up a key in a JSON object, exact match first, then case-insensitive.
fn get_key_ci<'a>(object: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a Value> {
    object.get(key).or_else(|| {
        object
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// Follows a dot-separated path. Numeric segments index arrays.
pub fn lookup_json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => get_key_ci(map, segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolves field values for documents of one index.
pub struct FieldResolver<T> {
    accessors: FieldAccessors<T>,
    dynamic: HashMap<String, DynamicField>,
}

impl<T: Serialize> FieldResolver<T> {
    pub fn new(accessors: FieldAccessors<T>, dynamic_fields: &[DynamicField]) -> Self {
        let dynamic = dynamic_fields
            .iter()
            .map(|f| (f.name.to_lowercase(), f.clone()))
            .collect();
        Self { accessors, dynamic }
    }

    /// Resolves one field
    pub fn resolve(&self, document: &T, field: &str) -> FieldValue {
        self.view(document).get(field)
    }

    /// A view that serializes the document at most once across lookups
    pub fn view<'a>(&'a self, document: &'a T) -> DocumentView<'a, T> {
        DocumentView {
            resolver: self,
            document,
            json: OnceCell::new(),
        }
    }

    /// Declared data type of a dynamic field, if any
    pub fn declared_type(&self, field: &str) -> DataType {
        self.dynamic
            .get(&field.to_lowercase())
            .map(|f| f.data_type)
            .unwrap_or_default()
    }
}

impl<T> fmt::Debug for FieldResolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldResolver")
            .field("accessors", &self.accessors)
            .field("dynamic", &self.dynamic.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Per-document field lookup
pub struct DocumentView<'a, T> {
    resolver: &'a FieldResolver<T>,
    document: &'a T,
    json: OnceCell<Option<Value>>,
}

impl<'a, T: Serialize> DocumentView<'a, T> {
    fn json(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| serde_json::to_value(self.document).ok())
            .as_ref()
    }

    /// Resolves one field
    pub fn get(&self, field: &str) -> FieldValue {
        if let Some(getter) = self.resolver.accessors.get(field) {
            return (**getter)(self.document);
        }

        let Some(json) = self.json() else {
            return FieldValue::Null;
        };

        let path = self
            .resolver
            .dynamic
            .get(&field.to_lowercase())
            .map(|f| f.path.as_str())
            .unwrap_or(field);

        lookup_json_path(json, path)
            .map(FieldValue::from_json)
            .unwrap_or(FieldValue::Null)
    }
}
