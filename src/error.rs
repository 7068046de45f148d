//! Centralized error handling for codepad
//!
//! This module provides a unified error type that covers all error scenarios
//! in the session core: rejected tab operations, durable store failures,
//! formatter rejections and configuration problems.

use log::warn;
use std::fmt;
use std::io;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────────────────────
// Custom Result Type Alias
// ─────────────────────────────────────────────────────────────────────────────

/// A specialized `Result` type for the application.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type returned by `DurableStore` operations.
pub type StoreResult<T> = std::result::Result<T, StorageError>;

/// The centralized error type for the application.
#[derive(Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────────────────
    // Tab Operation Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// A file with the same id is already open
    DuplicateName { id: String },

    /// The only remaining file cannot be deleted
    LastFile,

    /// No open file has the given id
    NotFound { id: String },

    /// The requested file name cannot be used as an id
    InvalidName { name: String, reason: &'static str },

    /// A tab index outside the current tab strip
    InvalidIndex { index: usize, len: usize },

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence and Formatting
    // ─────────────────────────────────────────────────────────────────────────
    /// The durable store rejected an operation
    Storage(StorageError),

    /// The formatter rejected the content
    Format(FormatError),

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Failed to load configuration file
    ConfigLoad {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to save configuration file
    ConfigSave {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse configuration (invalid JSON/format)
    ConfigParse {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration directory not found or inaccessible
    ConfigDirNotFound,

    // ─────────────────────────────────────────────────────────────────────────
    // Command Errors
    // ─────────────────────────────────────────────────────────────────────────
    /// Unparsable user command
    Command(String),
}

/// Failures of the durable store.
#[derive(Debug)]
pub enum StorageError {
    /// The store could not be reached or its location is missing
    Unavailable(String),

    /// A write would exceed the store's byte quota
    QuotaExceeded { needed: usize, available: usize },

    /// Underlying I/O failure
    Io { context: String, source: io::Error },

    /// A stored document could not be decoded
    Corrupt { key: String, message: String },

    /// The store handle was closed
    Closed,
}

/// Failures reported by a formatter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The content is not valid for its language
    Syntax {
        language: &'static str,
        message: String,
        line: Option<usize>,
    },

    /// No formatter is available for the language
    Unsupported { language: &'static str },
}

// Implement From traits for convenient error conversion
impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Error::Storage(err)
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Error::Format(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Storage(StorageError::from_io("I/O error", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigParse {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl StorageError {
    /// Wrap an I/O error with a short description of the failed operation.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        StorageError::Io {
            context: context.into(),
            source,
        }
    }

    /// Map an I/O error to the closest storage failure.
    ///
    /// A full disk is reported as a quota problem so the user sees the same
    /// message regardless of the backing store.
    pub fn from_io(context: impl Into<String>, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::StorageFull {
            return StorageError::QuotaExceeded {
                needed: 0,
                available: 0,
            };
        }
        Self::io(context, source)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Display trait implementation for user-friendly error messages
// ─────────────────────────────────────────────────────────────────────────────
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Tab Operation Errors
            Error::DuplicateName { id } => write!(f, "A file named '{}' already exists", id),
            Error::LastFile => write!(f, "Cannot delete the last remaining file"),
            Error::NotFound { id } => write!(f, "No open file named '{}'", id),
            Error::InvalidName { name, reason } => {
                write!(f, "Invalid file name '{}': {}", name, reason)
            }
            Error::InvalidIndex { index, len } => {
                write!(f, "Tab index {} is out of range (0..{})", index, len)
            }

            // Persistence and Formatting
            Error::Storage(err) => write!(f, "Storage error: {}", err),
            Error::Format(err) => write!(f, "Format failed: {}", err),

            // Configuration Errors
            Error::ConfigLoad { path, source } => {
                write!(
                    f,
                    "Failed to load configuration from '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigSave { path, source } => {
                write!(
                    f,
                    "Failed to save configuration to '{}': {}",
                    path.display(),
                    source
                )
            }
            Error::ConfigParse { message, .. } => {
                write!(f, "Invalid configuration format: {}", message)
            }
            Error::ConfigDirNotFound => {
                write!(f, "Configuration directory not found")
            }

            Error::Command(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Unavailable(msg) => write!(f, "store unavailable: {}", msg),
            StorageError::QuotaExceeded { needed, available } if *needed > 0 => write!(
                f,
                "storage quota exceeded ({} bytes needed, {} available)",
                needed, available
            ),
            StorageError::QuotaExceeded { .. } => write!(f, "storage quota exceeded"),
            StorageError::Io { context, source } => write!(f, "{}: {}", context, source),
            StorageError::Corrupt { key, message } => {
                write!(f, "record '{}' is corrupt: {}", key, message)
            }
            StorageError::Closed => write!(f, "store is closed"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::Syntax {
                language,
                message,
                line: Some(line),
            } => write!(f, "{} syntax error at line {}: {}", language, line, message),
            FormatError::Syntax {
                language, message, ..
            } => write!(f, "{} syntax error: {}", language, message),
            FormatError::Unsupported { language } => {
                write!(f, "no formatter available for {}", language)
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// std::error::Error trait implementation for error chaining
// ─────────────────────────────────────────────────────────────────────────────
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Storage(err) => Some(err),
            Error::Format(err) => Some(err),
            Error::ConfigLoad { source, .. } => Some(source.as_ref()),
            Error::ConfigSave { source, .. } => Some(source.as_ref()),
            Error::ConfigParse { source, .. } => source
                .as_ref()
                .map(|s| s.as_ref() as &(dyn std::error::Error + 'static)),
            Error::DuplicateName { .. }
            | Error::LastFile
            | Error::NotFound { .. }
            | Error::InvalidName { .. }
            | Error::InvalidIndex { .. }
            | Error::ConfigDirNotFound
            | Error::Command(_) => None,
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl std::error::Error for FormatError {}

// ─────────────────────────────────────────────────────────────────────────────
// Graceful Degradation Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Extension trait for Result to support graceful degradation.
pub trait ResultExt<T> {
    /// If the result is an error, log it at warning level and return the provided default.
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T;
}

impl<T> ResultExt<T> for Result<T> {
    fn unwrap_or_warn_default(self, default: T, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                warn!("{}: {}. Using default.", context, err);
                default
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_conversion() {
        let err = Error::from(StorageError::Closed);
        assert!(matches!(err, Error::Storage(StorageError::Closed)));
    }

    #[test]
    fn test_format_error_conversion() {
        let err = Error::from(FormatError::Unsupported {
            language: "JavaScript",
        });
        assert!(matches!(err, Error::Format(FormatError::Unsupported { .. })));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let json_result: std::result::Result<String, _> = serde_json::from_str("invalid json");
        let err = Error::from(json_result.unwrap_err());
        assert!(matches!(err, Error::ConfigParse { .. }));
    }

    #[test]
    fn test_display_duplicate_name() {
        let err = Error::DuplicateName {
            id: "index.js".to_string(),
        };
        assert_eq!(err.to_string(), "A file named 'index.js' already exists");
    }

    #[test]
    fn test_display_last_file() {
        assert_eq!(
            Error::LastFile.to_string(),
            "Cannot delete the last remaining file"
        );
    }

    #[test]
    fn test_display_quota_exceeded() {
        let err = Error::Storage(StorageError::QuotaExceeded {
            needed: 10,
            available: 4,
        });
        let msg = err.to_string();
        assert!(msg.contains("quota exceeded"));
        assert!(msg.contains("10 bytes needed"));
    }

    #[test]
    fn test_display_syntax_error_with_line() {
        let err = FormatError::Syntax {
            language: "JSON",
            message: "expected value".to_string(),
            line: Some(3),
        };
        assert_eq!(err.to_string(), "JSON syntax error at line 3: expected value");
    }

    #[test]
    fn test_storage_full_maps_to_quota() {
        let io_err = io::Error::new(io::ErrorKind::StorageFull, "disk full");
        let err = StorageError::from_io("write file", io_err);
        assert!(matches!(err, StorageError::QuotaExceeded { .. }));
        assert_eq!(err.to_string(), "storage quota exceeded");
    }

    #[test]
    fn test_error_source_storage_io() {
        use std::error::Error as StdError;
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = Error::Storage(StorageError::io("read", io_err));
        let source = err.source().expect("storage source");
        assert!(source.source().is_some());
    }

    #[test]
    fn test_error_source_none_for_simple_variants() {
        use std::error::Error as StdError;
        assert!(Error::LastFile.source().is_none());
        assert!(Error::ConfigDirNotFound.source().is_none());
        assert!(Error::Command("bad".to_string()).source().is_none());
    }

    #[test]
    fn test_unwrap_or_warn_default_ok() {
        let result: super::Result<i32> = Ok(42);
        let value = result.unwrap_or_warn_default(0, "test context");
        assert_eq!(value, 42);
    }

    #[test]
    fn test_unwrap_or_warn_default_err() {
        let result: super::Result<i32> = Err(Error::LastFile);
        let value = result.unwrap_or_warn_default(0, "test context");
        assert_eq!(value, 0);
    }
}
