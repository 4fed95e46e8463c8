//! Query engine
//!
//! Criteria are resolved against field indices where they exist and by
//! reading documents where they do not. Both paths share one matcher so the
//! answer never depends on whether a field is indexed.
//!
//! # Invariants
//!
//! - Criteria are AND-combined, left to right, stopping at the first empty set
//! - The entire candidate set is ordered before pagination
//! - Only documents on the requested page are materialized

mod compare;
mod criteria;
mod executor;
mod filters;
mod resolver;
mod result;
mod sorter;

pub use compare::{column_type, compare_keys};
pub use criteria::{Operator, SearchCriterion, SearchRequest, SortCriterion, SortDirection};
pub use executor::{QueryExecutor, RankedIds};
pub use filters::{similarity, KeyMatcher, FUZZY_THRESHOLD};
pub use resolver::{intersect, resolve_indexed};
pub use result::{SearchHit, SearchResult, SearchStatistics};
pub use sorter::{ResultSorter, SortColumn};
