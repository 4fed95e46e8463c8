//! `metadata.json`: index identity plus the last known counters
//!
//! The counters are only trusted when `cleanShutdown` is true. An index that
//! is open has `cleanShutdown: false` on disk, so a crash leaves a marker
//! that forces a directory scan on the next open.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::files;
use crate::index::{IndexDescriptor, IndexResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub item_count: u64,
    pub last_updated: DateTime<Utc>,
    /// Total bytes of stored documents
    pub index_size: u64,
    pub configuration: IndexDescriptor,
    #[serde(default)]
    pub clean_shutdown: bool,
}

impl IndexMetadata {
    pub fn new(configuration: IndexDescriptor, item_count: u64, index_size: u64) -> Self {
        Self {
            item_count,
            last_updated: Utc::now(),
            index_size,
            configuration,
            clean_shutdown: false,
        }
    }

    pub fn with_clean_shutdown(mut self, clean: bool) -> Self {
        self.clean_shutdown = clean;
        self
    }

    /// Reads metadata. Missing or unparseable files yield `None`.
    pub async fn load(path: &Path) -> Option<Self> {
        match files::read_json::<IndexMetadata>(path).await {
            Ok(found) => found,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable index metadata");
                None
            }
        }
    }

    /// Writes metadata atomically
    pub async fn save(&self, path: &Path) -> IndexResult<()> {
        files::write_json(path, self).await.map(|_| ())
    }
}
