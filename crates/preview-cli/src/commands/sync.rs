use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use preview_core::{PreviewConfig, SyncMode, config::SyncConfig};
use preview_sync::{DirStore, SyncOptions, SyncReport, Synchronizer};
use tokio::sync::watch;
use tracing::warn;

use crate::{Format, Mode};

pub struct SyncArgs {
    pub root: PathBuf,
    pub prefix: String,
    pub store_dir: PathBuf,
    pub config: Option<PathBuf>,
    pub mode: Option<Mode>,
    pub dry_run: bool,
    pub format: Format,
}

pub async fn sync(args: SyncArgs) -> anyhow::Result<()> {
    let report = run(&args).await?;

    match args.format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print!("{}", format_report(&report)),
    }

    if !report.is_complete() {
        bail!(
            "sync of {} incomplete: {} failed, {} not attempted",
            report.prefix,
            report.failed.len(),
            report.not_attempted.len()
        );
    }
    Ok(())
}

/// Run the synchronizer, stopping new uploads on Ctrl-C.
pub async fn run(args: &SyncArgs) -> anyhow::Result<SyncReport> {
    let sync_config = match &args.config {
        Some(path) => PreviewConfig::from_file(path)?.sync,
        None => SyncConfig::default(),
    };
    let mut options = SyncOptions::from_config(&sync_config).with_dry_run(args.dry_run);
    if let Some(mode) = args.mode {
        options = options.with_mode(match mode {
            Mode::Incremental => SyncMode::Incremental,
            Mode::Always => SyncMode::Always,
        });
    }

    let store = Arc::new(DirStore::new(&args.store_dir));
    let synchronizer = Synchronizer::new(store, options);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; finishing in-flight uploads");
            let _ = cancel_tx.send(true);
        }
    });

    let result = synchronizer
        .synchronize_until(&args.root, &args.prefix, cancel_rx)
        .await;
    interrupt.abort();
    Ok(result?)
}

pub fn format_report(report: &SyncReport) -> String {
    let mut out = String::new();
    let verb = if report.dry_run { "would upload" } else { "uploaded" };
    for record in &report.uploaded {
        out.push_str(&format!(
            "  + {} ({}, {} bytes)\n",
            record.key, record.content_type, record.size_bytes
        ));
    }
    for failure in &report.failed {
        out.push_str(&format!(
            "  ✗ {} after {} attempt(s): {}\n",
            failure.target, failure.attempts, failure.message
        ));
    }
    out.push_str(&format!(
        "{}: {} {}, {} unchanged, {} failed",
        report.prefix,
        verb,
        report.uploaded.len(),
        report.skipped.len(),
        report.failed.len()
    ));
    if report.cancelled {
        out.push_str(&format!(
            " (cancelled, {} not attempted)",
            report.not_attempted.len()
        ));
    }
    out.push('\n');
    out
}
