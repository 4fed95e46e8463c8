//! Index lifecycle and item events
//!
//! Events are explicit and typed. Each index publishes them through its
//! `Notifier`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::index::{ErrorKind, IndexError};

/// Index status.
///
/// Transitions: `Initializing -> Active -> Rebuilding -> Active | Error -> Disposed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexStatus {
    Initializing,
    Active,
    Rebuilding,
    Error,
    Disposed,
}

impl IndexStatus {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Initializing => "INITIALIZING",
            IndexStatus::Active => "ACTIVE",
            IndexStatus::Rebuilding => "REBUILDING",
            IndexStatus::Error => "ERROR",
            IndexStatus::Disposed => "DISPOSED",
        }
    }

    /// Returns true if the index still accepts operations
    pub fn is_usable(&self) -> bool {
        !matches!(self, IndexStatus::Disposed)
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notifications published by an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndexNotification {
    StatusChanged {
        index_id: String,
        from: IndexStatus,
        to: IndexStatus,
        at: DateTime<Utc>,
    },
    ItemAdded {
        index_id: String,
        document_id: String,
        at: DateTime<Utc>,
    },
    ItemUpdated {
        index_id: String,
        document_id: String,
        at: DateTime<Utc>,
    },
    ItemRemoved {
        index_id: String,
        document_id: String,
        at: DateTime<Utc>,
    },
    Error {
        index_id: String,
        kind: ErrorKind,
        message: String,
        cause: Option<String>,
        at: DateTime<Utc>,
    },
}

impl IndexNotification {
    /// Creates an error notification from an error
    pub fn error(index_id: &str, error: &IndexError) -> Self {
        IndexNotification::Error {
            index_id: index_id.to_string(),
            kind: error.kind(),
            message: error.to_string(),
            cause: error.cause(),
            at: Utc::now(),
        }
    }

    /// Returns the event name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexNotification::StatusChanged { .. } => "INDEX_STATUS_CHANGED",
            IndexNotification::ItemAdded { .. } => "INDEX_ITEM_ADDED",
            IndexNotification::ItemUpdated { .. } => "INDEX_ITEM_UPDATED",
            IndexNotification::ItemRemoved { .. } => "INDEX_ITEM_REMOVED",
            IndexNotification::Error { .. } => "INDEX_ERROR",
        }
    }

    /// Returns the originating index
    pub fn index_id(&self) -> &str {
        match self {
            IndexNotification::StatusChanged { index_id, .. }
            | IndexNotification::ItemAdded { index_id, .. }
            | IndexNotification::ItemUpdated { index_id, .. }
            | IndexNotification::ItemRemoved { index_id, .. }
            | IndexNotification::Error { index_id, .. } => index_id,
        }
    }

    /// Returns true for error notifications
    pub fn is_error(&self) -> bool {
        matches!(self, IndexNotification::Error { .. })
    }
}
