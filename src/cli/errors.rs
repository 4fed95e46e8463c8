//! CLI-specific error types

use std::fmt;
use std::io;

use crate::index::IndexError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout/document files)
    IoError,
    /// Already initialized
    AlreadyInitialized,
    /// Not initialized
    NotInitialized,
    /// No such index
    UnknownIndex,
    /// Malformed argument
    InvalidArgument,
    /// The index rejected the operation
    IndexFailed(&'static str),
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "STAYINDEX_CLI_CONFIG_ERROR",
            Self::IoError => "STAYINDEX_CLI_IO_ERROR",
            Self::AlreadyInitialized => "STAYINDEX_CLI_ALREADY_INITIALIZED",
            Self::NotInitialized => "STAYINDEX_CLI_NOT_INITIALIZED",
            Self::UnknownIndex => "STAYINDEX_CLI_UNKNOWN_INDEX",
            Self::InvalidArgument => "STAYINDEX_CLI_INVALID_ARGUMENT",
            Self::IndexFailed(code) => code,
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Already initialized
    pub fn already_initialized() -> Self {
        Self::new(
            CliErrorCode::AlreadyInitialized,
            "Configuration file already exists",
        )
    }

    /// Not initialized
    pub fn not_initialized() -> Self {
        Self::new(
            CliErrorCode::NotInitialized,
            "No configuration file. Run 'stayindex init' first.",
        )
    }

    pub fn unknown_index(id: &str) -> Self {
        Self::new(CliErrorCode::UnknownIndex, format!("No index named '{}'", id))
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<IndexError> for CliError {
    fn from(e: IndexError) -> Self {
        Self::new(CliErrorCode::IndexFailed(e.code()), e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_error_keeps_code() {
        let err = CliError::from(IndexError::DuplicateKey("p1".into()));
        assert_eq!(err.code_str(), "DUPLICATE_KEY");
        assert!(err.message().contains("p1"));
    }

    #[test]
    fn test_display() {
        let err = CliError::unknown_index("Properties");
        assert_eq!(
            err.to_string(),
            "STAYINDEX_CLI_UNKNOWN_INDEX: No index named 'Properties'"
        );
    }
}
