//! stayindex - an embedded, file-backed secondary index and search engine
//!
//! Documents live one JSON file each under `<root>/<IndexId>/items/`.
//! Field indices, full-text postings and facet views are derived files kept
//! next to them and maintained on every mutation.
//!
//! ```no_run
//! use stayindex::index::{FieldAccessors, IndexConfiguration, IndexDescriptor, SearchIndex};
//! use stayindex::query::{SearchCriterion, SearchRequest};
//!
//! # async fn demo() -> stayindex::index::IndexResult<()> {
//! let descriptor = IndexDescriptor::new("Properties", "./data").with_fields(["city"]);
//! let index: SearchIndex<serde_json::Value> =
//!     SearchIndex::open(IndexConfiguration::new(descriptor, FieldAccessors::new())).await?;
//!
//! index.add("p1", serde_json::json!({ "city": "Aden", "price": 100 })).await?;
//! let result = index
//!     .search(&SearchRequest::new().filter(SearchCriterion::eq("city", "aden")))
//!     .await;
//! assert_eq!(result.total_count, 1);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod config;
pub mod facets;
pub mod fulltext;
pub mod index;
pub mod observability;
pub mod query;
pub mod registry;
pub mod storage;
