//! Facet views
//!
//! A facet groups documents by the values of one field (or by numeric
//! ranges of it) and keeps a small summary per value: member IDs, measure
//! averages and cross-tabulations against the other facets. They are
//! materialized views over `items/` and can always be rebuilt.

mod definition;
mod store;

pub use definition::FacetSpec;
pub use store::{DocumentFacets, FacetChange, FacetEntry, FacetStore, MeasureTotal};
