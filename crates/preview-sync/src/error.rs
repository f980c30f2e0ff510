//! Error types for asset synchronization.

use std::path::PathBuf;

use preview_core::PrefixError;
use thiserror::Error;

/// Errors reported by an [`ObjectStore`](crate::ObjectStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the write (permissions, policy, bad key).
    #[error("store rejected {key}: {reason}")]
    Rejected { key: String, reason: String },

    #[error("store request for {0} timed out")]
    Timeout(String),

    /// Temporarily unavailable or throttled.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store metadata error: {0}")]
    Metadata(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Timeout(_) | StoreError::Unavailable(_))
    }
}

/// A failure confined to a single file. Never aborts the run.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A path component is not valid UTF-8 and has no object key.
    #[error("file name is not valid UTF-8: {}", .path.display())]
    InvalidName { path: PathBuf },

    #[error("failed to upload {key} after {attempts} attempt(s): {source}")]
    Upload {
        key: String,
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

/// Errors that stop a synchronization before any upload is attempted.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("build root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("build root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("invalid deployment prefix: {0}")]
    Prefix(#[from] PrefixError),

    #[error("build tree walk failed: {0}")]
    Walk(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
