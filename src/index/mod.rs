//! Index subsystem
//!
//! A `SearchIndex` owns one directory under the storage root. Documents are
//! the source of truth; field indices, full-text postings and facet files
//! are derived from them and can always be rebuilt.
//!
//! # Design Principles
//!
//! - Derived state: every derived file is a function of `items/`
//! - Deterministic: BTreeMap/BTreeSet ordering in everything persisted
//! - Atomic files: every write goes through a temp file and a rename
//!
//! # Invariants
//!
//! - A document ID appears under at most one key per field index
//! - Field index updates occur AFTER the document write
//! - Counters reflect the files on disk after a clean shutdown

mod config;
mod engine;
mod errors;
mod field_index;
mod fields;
mod value;

pub use config::{IndexConfiguration, IndexDescriptor};
pub use engine::{Document, IndexSnapshot, IndexStatistics, SearchIndex};
pub use errors::{ErrorKind, IndexError, IndexResult};
pub use field_index::{FieldIndex, FieldIndexStore};
pub use fields::{lookup_json_path, Accessor, DocumentView, DynamicField, FieldAccessors, FieldResolver};
pub use value::{parse_bool, parse_date, DataType, FieldValue};
