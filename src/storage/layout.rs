//! On-disk layout of one index
//!
//! ```text
//! <root>/<IndexId>/items/<documentId>.json
//! <root>/<IndexId>/<fieldName>_index.json
//! <root>/<IndexId>/fulltext_index.json
//! <root>/<IndexId>/<facetType>/<facetKey>.json
//! <root>/<IndexId>/metadata.json
//! ```
//!
//! Document IDs, field names and facet keys are turned into file stems with a
//! reversible percent-encoding, so any non-blank ID maps to exactly one file.

use std::path::{Path, PathBuf};

pub const ITEMS_DIR: &str = "items";
pub const METADATA_FILE: &str = "metadata.json";
pub const FULLTEXT_FILE: &str = "fulltext_index.json";
pub const FIELD_INDEX_SUFFIX: &str = "_index.json";
pub const JSON_EXT: &str = "json";

/// Encodes an arbitrary string into a safe file stem.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `%XX`.
pub fn encode_file_stem(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Reverses `encode_file_stem`. Returns None for malformed input.
pub fn decode_file_stem(stem: &str) -> Option<String> {
    let bytes = stem.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = stem.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// File name of the field index for `field`.
///
/// Field names are matched case-insensitively, so the file uses the
/// lowercased name.
pub fn field_index_file_name(field: &str) -> String {
    format!(
        "{}{}",
        encode_file_stem(&field.to_lowercase()),
        FIELD_INDEX_SUFFIX
    )
}

/// True if a field index for `field` would land on another derived file.
pub fn is_reserved_field_name(field: &str) -> bool {
    field_index_file_name(field) == FULLTEXT_FILE
}

/// Paths for one index directory.
#[derive(Debug, Clone)]
pub struct IndexLayout {
    dir: PathBuf,
}

impl IndexLayout {
    /// Layout for index `index_id` under `root`
    pub fn new(root: &Path, index_id: &str) -> Self {
        Self {
            dir: root.join(encode_file_stem(index_id)),
        }
    }

    /// The index directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn items_dir(&self) -> PathBuf {
        self.dir.join(ITEMS_DIR)
    }

    pub fn document_path(&self, document_id: &str) -> PathBuf {
        self.items_dir()
            .join(format!("{}.{}", encode_file_stem(document_id), JSON_EXT))
    }

    pub fn field_index_path(&self, field: &str) -> PathBuf {
        self.dir.join(field_index_file_name(field))
    }

    pub fn fulltext_path(&self) -> PathBuf {
        self.dir.join(FULLTEXT_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    pub fn facet_dir(&self, facet_type: &str) -> PathBuf {
        self.dir.join(encode_file_stem(facet_type))
    }

    pub fn facet_path(&self, facet_type: &str, key: &str) -> PathBuf {
        self.facet_dir(facet_type)
            .join(format!("{}.{}", encode_file_stem(key), JSON_EXT))
    }

    /// Extracts the document ID from a file under `items/`
    pub fn document_id_from_path(path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != JSON_EXT {
            return None;
        }
        decode_file_stem(path.file_stem()?.to_str()?)
    }
}
