//! Outcome of one synchronization run.

use serde::{Deserialize, Serialize};

use preview_core::AssetRecord;

use crate::error::AssetError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Read,
    InvalidName,
    Upload,
}

/// A per-file failure, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFailure {
    pub kind: FailureKind,
    /// Local path for read and name failures, remote key for upload failures.
    pub target: String,
    pub attempts: u32,
    pub message: String,
}

impl From<&AssetError> for AssetFailure {
    fn from(err: &AssetError) -> Self {
        match err {
            AssetError::Read { path, .. } => AssetFailure {
                kind: FailureKind::Read,
                target: path.display().to_string(),
                attempts: 0,
                message: err.to_string(),
            },
            AssetError::InvalidName { path } => AssetFailure {
                kind: FailureKind::InvalidName,
                target: path.display().to_string(),
                attempts: 0,
                message: err.to_string(),
            },
            AssetError::Upload { key, attempts, .. } => AssetFailure {
                kind: FailureKind::Upload,
                target: key.clone(),
                attempts: *attempts,
                message: err.to_string(),
            },
        }
    }
}

/// What a synchronization run did.
///
/// `uploaded` and `skipped` are sorted by key; `failed` by target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub prefix: String,
    pub dry_run: bool,
    /// Objects written (or that would be written, for a dry run).
    pub uploaded: Vec<AssetRecord>,
    /// Objects whose stored fingerprint already matched.
    pub skipped: Vec<AssetRecord>,
    pub failed: Vec<AssetFailure>,
    /// Keys never started because the run was cancelled.
    pub not_attempted: Vec<String>,
    pub cancelled: bool,
}

impl SyncReport {
    /// Number of actual writes to the store.
    pub fn writes(&self) -> usize {
        if self.dry_run { 0 } else { self.uploaded.len() }
    }

    /// Every file is present remotely under the prefix.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.not_attempted.is_empty() && !self.cancelled
    }

    /// All remote keys known to be current after this run.
    pub fn synced_keys(&self) -> impl Iterator<Item = &str> {
        self.uploaded
            .iter()
            .chain(self.skipped.iter())
            .map(|r| r.key.as_str())
    }

    pub(crate) fn sort(&mut self) {
        self.uploaded.sort_by(|a, b| a.key.cmp(&b.key));
        self.skipped.sort_by(|a, b| a.key.cmp(&b.key));
        self.failed.sort_by(|a, b| a.target.cmp(&b.target));
        self.not_attempted.sort();
    }
}
