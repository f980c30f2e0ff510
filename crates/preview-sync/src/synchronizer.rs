//! Concurrent, cancellable reconciliation of a build tree.
//!
//! For each local file the synchronizer computes its fingerprint and, in
//! incremental mode, compares it with the fingerprint the store recorded
//! for the same key. Unchanged files are skipped, everything else is
//! written. Per-file failures are collected in the [`SyncReport`] and never
//! stop other files.
//!
//! Two runs against the same prefix at the same time are not supported:
//! nothing arbitrates between them and the last write of each key wins.

use std::path::Path;
use std::sync::Arc;

use preview_core::config::SyncConfig;
use preview_core::{
    AssetRecord, ContentTypes, DeploymentPrefix, Fingerprint, PrefixPolicy, SyncMode,
};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{AssetError, SyncError, SyncResult};
use crate::report::{AssetFailure, FailureKind, SyncReport};
use crate::retry::RetryPolicy;
use crate::store::{ObjectStore, PutObject};
use crate::walk::{LocalAsset, collect_assets};

/// Knobs for a synchronization run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub mode: SyncMode,
    pub prefix_policy: PrefixPolicy,
    /// Maximum uploads in flight at once.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Compute the report without writing anything.
    pub dry_run: bool,
    pub content_types: ContentTypes,
    /// Canned ACL written with every object.
    pub object_acl: String,
}

impl SyncOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            mode: config.mode,
            prefix_policy: config.prefix_policy,
            concurrency: config.concurrency,
            retry: RetryPolicy::from_config(config),
            dry_run: false,
            content_types: ContentTypes::default(),
            object_acl: config.object_acl.clone(),
        }
    }

    pub fn with_mode(mut self, mode: SyncMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

enum FileOutcome {
    Uploaded(AssetRecord),
    Skipped(AssetRecord),
    Failed(AssetError),
}

/// Uploads build trees into an [`ObjectStore`] under deployment prefixes.
pub struct Synchronizer {
    store: Arc<dyn ObjectStore>,
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(store: Arc<dyn ObjectStore>, options: SyncOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Synchronize `root` under `prefix`, running to completion.
    pub async fn synchronize(&self, root: &Path, prefix: &str) -> SyncResult<SyncReport> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.synchronize_until(root, prefix, cancel_rx).await
    }

    /// Synchronize `root` under `prefix` until `cancel` turns `true`.
    ///
    /// After cancellation no new uploads start; uploads already in flight
    /// finish and are reported. Files never started are listed in
    /// [`SyncReport::not_attempted`].
    pub async fn synchronize_until(
        &self,
        root: &Path,
        prefix: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> SyncResult<SyncReport> {
        let prefix = DeploymentPrefix::parse(prefix, self.options.prefix_policy)?;

        let walk_root = root.to_path_buf();
        let walk_prefix = prefix.clone();
        let content_types = self.options.content_types.clone();
        let walked = tokio::task::spawn_blocking(move || {
            collect_assets(&walk_root, &walk_prefix, &content_types)
        })
        .await
        .map_err(|e| SyncError::Walk(e.to_string()))??;

        info!(
            prefix = %prefix,
            root = %root.display(),
            files = walked.assets.len(),
            mode = ?self.options.mode,
            dry_run = self.options.dry_run,
            "starting asset sync"
        );

        let mut report = SyncReport {
            prefix: prefix.to_string(),
            dry_run: self.options.dry_run,
            ..SyncReport::default()
        };
        for err in &walked.errors {
            warn!(error = %err, "unreadable entry in build tree");
            report.failed.push(AssetFailure::from(err));
        }

        let semaphore = Arc::new(Semaphore::new(self.options.concurrency.max(1)));
        let mut tasks = JoinSet::new();
        let mut pending = walked.assets.into_iter();

        while let Some(asset) = pending.next() {
            let permit = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    report.cancelled = true;
                    report.not_attempted.push(asset.key);
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        report.not_attempted.push(asset.key);
                        break;
                    }
                },
            };

            let store = Arc::clone(&self.store);
            let mode = self.options.mode;
            let retry = self.options.retry;
            let dry_run = self.options.dry_run;
            let acl = self.options.object_acl.clone();
            tasks.spawn(async move {
                let target = Target {
                    mode,
                    retry,
                    dry_run,
                    acl,
                };
                let outcome = sync_one(store.as_ref(), asset, &target).await;
                drop(permit);
                outcome
            });
        }
        report.not_attempted.extend(pending.map(|a| a.key));

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(FileOutcome::Uploaded(record)) => report.uploaded.push(record),
                Ok(FileOutcome::Skipped(record)) => report.skipped.push(record),
                Ok(FileOutcome::Failed(err)) => {
                    warn!(error = %err, "asset sync failed");
                    report.failed.push(AssetFailure::from(&err));
                }
                Err(join_err) => {
                    error!(error = %join_err, "asset sync task aborted");
                    report.failed.push(AssetFailure {
                        kind: FailureKind::Upload,
                        target: "<task>".to_string(),
                        attempts: 0,
                        message: join_err.to_string(),
                    });
                }
            }
        }

        report.sort();
        info!(
            prefix = %report.prefix,
            uploaded = report.uploaded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            not_attempted = report.not_attempted.len(),
            cancelled = report.cancelled,
            "asset sync finished"
        );
        Ok(report)
    }
}

/// Resolves once the cancel flag is set. Never resolves if the sender is
/// dropped without cancelling.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Per-file write settings.
struct Target {
    mode: SyncMode,
    retry: RetryPolicy,
    dry_run: bool,
    acl: String,
}

async fn sync_one(store: &dyn ObjectStore, asset: LocalAsset, target: &Target) -> FileOutcome {
    let Target {
        mode,
        retry,
        dry_run,
        ref acl,
    } = *target;
    let body = match tokio::fs::read(&asset.path).await {
        Ok(body) => body,
        Err(source) => {
            return FileOutcome::Failed(AssetError::Read {
                path: asset.path,
                source,
            });
        }
    };

    let fingerprint = Fingerprint::of(&body);
    let record = AssetRecord {
        relative_path: asset.relative_path,
        key: asset.key,
        fingerprint,
        content_type: asset.content_type,
        size_bytes: body.len() as u64,
    };

    if mode == SyncMode::Incremental {
        match retry.run(&record.key, || store.head(&record.key)).await {
            Ok(Some(stored)) if stored == fingerprint => {
                debug!(key = %record.key, "unchanged, skipping");
                return FileOutcome::Skipped(record);
            }
            Ok(_) => {}
            Err((err, _)) => {
                warn!(key = %record.key, error = %err, "fingerprint lookup failed, uploading");
            }
        }
    }

    if dry_run {
        debug!(key = %record.key, "dry run, not uploading");
        return FileOutcome::Uploaded(record);
    }

    let put = || {
        store.put(PutObject {
            key: record.key.clone(),
            body: body.clone(),
            content_type: record.content_type.clone(),
            acl: acl.clone(),
            fingerprint,
        })
    };
    match retry.run(&record.key, put).await {
        Ok(()) => {
            debug!(key = %record.key, bytes = record.size_bytes, "uploaded");
            FileOutcome::Uploaded(record)
        }
        Err((source, attempts)) => FileOutcome::Failed(AssetError::Upload {
            key: record.key,
            attempts,
            source,
        }),
    }
}
