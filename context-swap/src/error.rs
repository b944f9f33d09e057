//! Swap engine error types
//!
//! Every failure inside the engine is one of these variants. None of them
//! escape to the host: the collaborator-facing wrappers log and degrade to
//! "no entry" / "empty" instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for swap engine operations
pub type SwapResult<T> = Result<T, SwapError>;

/// Errors that can occur inside the swap engine
#[derive(Error, Debug)]
pub enum SwapError {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Read/write failure on a blob, metadata document, or index
    #[error("Storage I/O error ({context}) at {path}: {source}")]
    StorageIo {
        context: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Structured payload could not be turned into canonical text
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Caller supplied a swap id that cannot name a stored entry
    #[error("Invalid swap id: {swap_id:?}")]
    InvalidSwapId { swap_id: String },

    /// No entry with this id exists in the session
    #[error("Swap entry {swap_id} not found in session {session_id}")]
    EntryNotFound { session_id: String, swap_id: String },

    /// The entry was evicted by the capacity limit as soon as it was appended
    #[error("Swap entry {swap_id} was evicted immediately by the capacity limit")]
    Evicted { swap_id: String },

    /// Every generated id collided with an existing artifact
    #[error("Could not allocate a unique swap id after {attempts} attempts")]
    IdExhausted { attempts: u32 },
}

impl SwapError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wrap an IO error with the operation and path it happened on
    pub fn storage(
        context: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::StorageIo {
            context: context.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an entry not found error
    pub fn entry_not_found(session_id: impl Into<String>, swap_id: impl Into<String>) -> Self {
        Self::EntryNotFound {
            session_id: session_id.into(),
            swap_id: swap_id.into(),
        }
    }

    /// Stable machine-readable code, used as a structured log field
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "CONFIG_ERROR",
            Self::StorageIo { .. } | Self::Io(_) => "STORAGE_IO",
            Self::Json(_) => "JSON_ERROR",
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
            Self::InvalidSwapId { .. } => "INVALID_SWAP_ID",
            Self::EntryNotFound { .. } => "ENTRY_NOT_FOUND",
            Self::Evicted { .. } => "EVICTED_ON_APPEND",
            Self::IdExhausted { .. } => "ID_EXHAUSTED",
        }
    }

    /// Whether the error just means "the thing is already gone"
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::EntryNotFound { .. } => true,
            Self::StorageIo { source, .. } | Self::Io(source) => {
                source.kind() == std::io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}
