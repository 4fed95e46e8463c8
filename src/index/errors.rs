//! Index error types
//!
//! Every public operation returns `IndexResult<T>`. The same error is also
//! published as an `IndexNotification::Error` so subscribers can observe
//! failures without owning the call site.
//!
//! Error codes:
//! - VALIDATION_ERROR
//! - DUPLICATE_KEY
//! - ITEM_NOT_FOUND
//! - FILE_OPERATION_ERROR
//! - SEARCH_ERROR
//! - REBUILD_ERROR (FATAL)
//! - INITIALIZATION_ERROR (FATAL)
//! - DISPOSE_ERROR
//! - INDEX_DISPOSED
//! - CONFIGURATION_ERROR

use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Coarse classification of an `IndexError`, carried in notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Validation,
    DuplicateKey,
    ItemNotFound,
    FileOperation,
    Search,
    Rebuild,
    Initialization,
    Dispose,
    Disposed,
    Configuration,
}

impl ErrorKind {
    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::DuplicateKey => "DUPLICATE_KEY",
            ErrorKind::ItemNotFound => "ITEM_NOT_FOUND",
            ErrorKind::FileOperation => "FILE_OPERATION_ERROR",
            ErrorKind::Search => "SEARCH_ERROR",
            ErrorKind::Rebuild => "REBUILD_ERROR",
            ErrorKind::Initialization => "INITIALIZATION_ERROR",
            ErrorKind::Dispose => "DISPOSE_ERROR",
            ErrorKind::Disposed => "INDEX_DISPOSED",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
        }
    }

    /// Fatal kinds move the index into `IndexStatus::Error`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::Rebuild | ErrorKind::Initialization)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Index errors
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("File operation failed: {message}")]
    FileOperation {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Rebuild failed: {0}")]
    Rebuild(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Dispose failed: {0}")]
    Dispose(String),

    #[error("Index disposed: {0}")]
    Disposed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl IndexError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an I/O failure error for a path
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::FileOperation {
            message: format!("{}: {}", path.display(), source),
            source: Some(source),
        }
    }

    /// Create a file error without an underlying I/O cause (corrupt content)
    pub fn corrupt(path: &Path, reason: impl fmt::Display) -> Self {
        Self::FileOperation {
            message: format!("{}: {}", path.display(), reason),
            source: None,
        }
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::DuplicateKey(_) => ErrorKind::DuplicateKey,
            Self::ItemNotFound(_) => ErrorKind::ItemNotFound,
            Self::FileOperation { .. } => ErrorKind::FileOperation,
            Self::Search(_) => ErrorKind::Search,
            Self::Rebuild(_) => ErrorKind::Rebuild,
            Self::Initialization(_) => ErrorKind::Initialization,
            Self::Dispose(_) => ErrorKind::Dispose,
            Self::Disposed(_) => ErrorKind::Disposed,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Returns the stable string code
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Returns whether this error is fatal for the index
    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }

    /// Renders the underlying cause, if any
    pub fn cause(&self) -> Option<String> {
        match self {
            Self::FileOperation {
                source: Some(source),
                ..
            } => Some(source.to_string()),
            _ => None,
        }
    }
}
