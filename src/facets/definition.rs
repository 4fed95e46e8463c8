//! Facet definitions and key extraction

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::index::{FieldValue, IndexError, IndexResult};

/// One facet dimension: documents are grouped by the keys extracted from
/// `field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetSpec {
    /// Directory name under the index, e.g. `city` or `price-range`
    pub facet_type: String,
    pub field: String,
    /// Ascending bucket boundaries for numeric fields
    #[serde(default)]
    pub buckets: Vec<f64>,
}

impl FacetSpec {
    pub fn new(facet_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            facet_type: facet_type.into(),
            field: field.into(),
            buckets: Vec::new(),
        }
    }

    /// Groups numeric values into ranges, e.g. `[50, 100]` gives
    /// `below-50`, `50-100` and `100-plus`.
    pub fn with_buckets(mut self, buckets: impl Into<Vec<f64>>) -> Self {
        self.buckets = buckets.into();
        self
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.facet_type.trim().is_empty() || self.field.trim().is_empty() {
            return Err(IndexError::validation("facets need a type and a field"));
        }
        if self.buckets.iter().any(|b| !b.is_finite()) {
            return Err(IndexError::validation(format!(
                "facet '{}' has a non-finite bucket boundary",
                self.facet_type
            )));
        }
        if self.buckets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(IndexError::validation(format!(
                "facet '{}' bucket boundaries must be strictly ascending",
                self.facet_type
            )));
        }
        Ok(())
    }

    fn bucket_key(&self, x: f64) -> String {
        let bounds = &self.buckets;
        match bounds.iter().position(|b| x < *b) {
            Some(0) => format!("below-{}", bounds[0]),
            Some(i) => format!("{}-{}", bounds[i - 1], bounds[i]),
            None => format!("{}-plus", bounds[bounds.len() - 1]),
        }
    }

    /// Keys for one field value. Lists yield one key per element; nulls and
    /// (when bucketed) non-numeric values yield nothing.
    pub fn keys_for(&self, value: &FieldValue) -> BTreeSet<String> {
        value
            .elements()
            .into_iter()
            .filter_map(|v| {
                if self.buckets.is_empty() {
                    v.to_key()
                } else {
                    v.as_f64().map(|x| self.bucket_key(x))
                }
            })
            .filter(|k| !k.trim().is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_keys_explode_lists() {
        let spec = FacetSpec::new("amenity", "amenities");
        let keys = spec.keys_for(&FieldValue::from(vec!["wifi", "pool", "wifi"]));
        assert_eq!(keys.into_iter().collect::<Vec<_>>(), vec!["pool", "wifi"]);
        assert!(spec.keys_for(&FieldValue::Null).is_empty());
    }

    #[test]
    fn test_bucket_keys() {
        let spec = FacetSpec::new("price-range", "price").with_buckets([50.0, 100.0, 200.0, 500.0]);
        let key = |x: f64| spec.keys_for(&FieldValue::Float(x)).into_iter().next().unwrap();

        assert_eq!(key(20.0), "below-50");
        assert_eq!(key(50.0), "50-100");
        assert_eq!(key(150.0), "100-200");
        assert_eq!(key(500.0), "500-plus");
        assert!(spec.keys_for(&FieldValue::from("cheap")).is_empty());
    }

    #[test]
    fn test_validate_buckets() {
        assert!(FacetSpec::new("p", "price").with_buckets([10.0, 5.0]).validate().is_err());
        assert!(FacetSpec::new("", "price").validate().is_err());
        assert!(FacetSpec::new("p", "price").with_buckets([5.0, 10.0]).validate().is_ok());
    }
}
