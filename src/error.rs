//! Error types for rnc-importer
//!
//! This module provides error handling for the import pipeline:
//! - [`Error`] for failures that keep a run from producing a summary at all
//! - Stage errors (fetch, locate, decode) that end a run as `Failed`; they are
//!   carried in [`RunFailure`](crate::types::RunFailure), never raised as [`Error`]
//! - Record-level and batch-level errors that are counted and reported, never fatal
//! - HTTP status code mapping and structured JSON bodies for the trigger endpoint

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for rnc-importer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rnc-importer
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "import.batch_size")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another import run holds the gate
    #[error("an import run is already active")]
    ImportAlreadyRunning,

    /// Shutdown in progress - not accepting new runs
    #[error("shutdown in progress: not accepting new import runs")]
    ShuttingDown,

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Transaction could not be started, committed or rolled back
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}

/// Archive download errors
///
/// Variants carry plain strings so they can be cloned into an
/// [`ImportSummary`](crate::types::ImportSummary) and serialized.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    /// Connection failure, timeout or non-2xx response
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// URL that was requested
        url: String,
        /// HTTP status, when a response was received
        status: Option<u16>,
        /// Underlying failure description
        reason: String,
        /// Whether a later attempt may succeed (timeouts, connect errors, 5xx)
        transient: bool,
    },

    /// Server answered successfully with a zero-length body
    #[error("empty response body from {url}")]
    Empty {
        /// URL that was requested
        url: String,
    },
}

/// Archive container errors
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocateError {
    /// The configured entry path is not present in the archive
    #[error("entry {expected} not found in archive ({} entries present)", .available.len())]
    EntryNotFound {
        /// Entry path the locator was configured with
        expected: String,
        /// Entry names that were present
        available: Vec<String>,
    },

    /// The archive (or the selected entry) could not be read
    #[error("corrupt archive: {reason}")]
    CorruptArchive {
        /// Parser failure description
        reason: String,
    },
}

/// Secondary codec errors
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecodeError {
    /// The decoder could not initialize from the entry's header
    #[error("cannot decode {entry} as {codec}: {reason}")]
    UnsupportedOrCorrupt {
        /// Entry name
        entry: String,
        /// Codec selected from the entry name
        codec: String,
        /// Failure description
        reason: String,
    },

    /// The entry stream failed after records started flowing
    #[error("stream for {entry} interrupted after line {line}: {reason}")]
    StreamInterrupted {
        /// Entry name
        entry: String,
        /// Last line read successfully
        line: u64,
        /// Failure description
        reason: String,
    },
}

/// Line-level parse failures (skipped, never fatal)
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseError {
    /// The line has fewer pipe-delimited fields than the layout requires
    #[error("expected at least {required} fields, found {found}")]
    TooFewFields {
        /// Number of fields present
        found: usize,
        /// Minimum number of fields
        required: usize,
    },

    /// The start date field is present but not a DD/MM/YYYY date
    #[error("invalid start date {value:?}: {reason}")]
    BadDate {
        /// Trimmed field value
        value: String,
        /// Parser failure description
        reason: String,
    },

    /// The natural key field is blank
    #[error("registration number is empty")]
    MissingRegistrationNumber,

    /// The line exceeds the per-line byte limit and was skipped unread
    #[error("line longer than {limit} bytes")]
    LineTooLong {
        /// Maximum accepted line length in bytes
        limit: usize,
    },
}

/// Batch-level persistence failures (counted, never fatal)
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PersistError {
    /// The storage collaborator rejected the batch; nothing from it was written
    #[error("batch {batch} ({size} records, {first_key}..{last_key}) failed: {reason}")]
    BatchFailed {
        /// Zero-based batch index within the run
        batch: u64,
        /// Records in the batch
        size: usize,
        /// Registration number of the first record
        first_key: String,
        /// Registration number of the last record
        last_key: String,
        /// Storage failure description
        reason: String,
    },
}

/// API error response format
///
/// ```json
/// {
///   "error": {
///     "code": "import_already_running",
///     "message": "an import run is already active"
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create an API error with additional details
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,

            // 409 Conflict - the gate is held by another run
            Error::ImportAlreadyRunning => 409,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,

            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::ImportAlreadyRunning => "import_already_running",
            Error::ShuttingDown => "shutting_down",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            _ => None,
        };

        match details {
            Some(details) => ApiError::with_details(code, message, details),
            None => ApiError::new(code, message),
        }
    }
}
