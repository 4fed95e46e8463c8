//! Cache layer
//!
//! Each index owns two independent caches: one for documents, one for field
//! indices. Both are bounded by entry count and by idle time, and a
//! background sweeper purges idle entries on a fixed interval.
//!
//! The cache never owns data. Dropping any entry is always safe because
//! the files on disk remain the source of truth.

mod sweeper;
mod ttl;

pub use sweeper::{CacheSweeper, Sweepable};
pub use ttl::{CacheRecord, CacheStats, TtlCache};
