//! Error taxonomy for the backup engine.
//!
//! Run-level preconditions (`NoCredentials`, `EmptySelection`) abort before
//! any transfer. Per-file failures (`UnsupportedType`, `Transfer`) are folded
//! into the run result by the uploader and never escape the batch loop.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackupError {
    /// A run was requested without configured credentials. Nothing is
    /// attempted and no history entry is written.
    #[error("Telegram credentials not configured")]
    NoCredentials,

    /// A run was requested with an empty selection.
    #[error("no files selected for upload")]
    EmptySelection,

    /// A selected entry cannot be transferred as-is (e.g. a folder that was
    /// not expanded upstream). Per-file; recorded as a failure.
    #[error("unsupported file type for '{name}'")]
    UnsupportedType { name: String },

    /// A single transfer failed: network error, timeout, or remote
    /// rejection. Per-file; recorded as a failure.
    #[error("transfer of '{name}' failed: {message}")]
    Transfer { name: String, message: String },

    /// Bot token validation failed.
    #[error("Bot validation failed: {0}")]
    Auth(String),

    /// Destination chat validation failed.
    #[error("Chat validation failed: {0}")]
    Destination(String),

    /// Schedule operation targeted an id that does not exist.
    #[error("schedule '{0}' not found")]
    NotFound(String),

    /// Malformed input rejected before any write.
    #[error("{0}")]
    Validation(String),

    /// The persistence layer failed; in-memory state is left unchanged.
    #[error("storage error: {0}")]
    Storage(String),
}

impl BackupError {
    /// Per-file errors are folded into the run result instead of aborting
    /// the batch.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            BackupError::UnsupportedType { .. } | BackupError::Transfer { .. }
        )
    }
}
