//! Storage subsystem
//!
//! Files on disk are the source of truth; every cache above this layer can
//! be dropped at any time.
//!
//! # Design Principles
//!
//! - One JSON file per document under `items/`
//! - Whole-file writes through temp file + rename
//! - Writers of the same file are serialized by a per-path lock
//! - Readers never lock

mod documents;
mod files;
mod layout;
mod metadata;

pub use documents::{validate_document_id, DocumentStore};
pub use files::{
    exists, file_size, list_dirs, list_files, read_json, remove_dir_if_exists, remove_if_exists,
    write_atomic, write_json, FileLocks,
};
pub use layout::{
    decode_file_stem, encode_file_stem, is_reserved_field_name, IndexLayout, FIELD_INDEX_SUFFIX, FULLTEXT_FILE,
    ITEMS_DIR, JSON_EXT, METADATA_FILE,
};
pub use metadata::IndexMetadata;
