//! Index registry
//!
//! Owns every open `SearchIndex` under one storage root and fans queries
//! out across several of them.
//!
//! # Invariants
//!
//! - At most one open index per ID
//! - The registry lock is never held across an await
//! - A merged multi-index page equals the page of the merged full ordering

mod manager;
mod merge;

pub use manager::IndexRegistry;
pub use merge::{merge_ranked, MergedHit, MergedPage};
