//! Preview asset synchronizer.
//!
//! Reconciles a local build-output tree against a remote object store under
//! a per-deployment key prefix.
//!
//! # Components
//!
//! - **`walk`** — enumerates regular files and maps them to remote keys
//! - **`store`** — the `ObjectStore` seam plus an in-memory implementation
//! - **`dir_store`** — a directory-backed store for local operation
//! - **`retry`** — bounded exponential backoff for transient upload failures
//! - **`synchronizer`** — concurrent, cancellable reconciliation
//! - **`report`** — per-run outcome, including every per-file failure

pub mod dir_store;
pub mod error;
pub mod report;
pub mod retry;
pub mod store;
pub mod synchronizer;
pub mod walk;

pub use dir_store::DirStore;
pub use error::{AssetError, StoreError, SyncError};
pub use report::{AssetFailure, FailureKind, SyncReport};
pub use retry::RetryPolicy;
pub use store::{MemoryStore, ObjectStore, PutObject, StoredObject};
pub use synchronizer::{SyncOptions, Synchronizer};
pub use walk::{LocalAsset, WalkOutcome, collect_assets};
