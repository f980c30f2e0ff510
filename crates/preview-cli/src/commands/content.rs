use std::path::PathBuf;

use anyhow::{Context, bail};
use preview_graph::DeploymentContent;
use preview_sync::SyncReport;

/// Read `preview sync --format json` reports into deployment content.
///
/// Only complete, non-dry-run reports describe what is actually in the
/// bucket, so anything else is refused.
pub fn load_reports(paths: &[PathBuf]) -> anyhow::Result<Vec<DeploymentContent>> {
    paths
        .iter()
        .map(|path| {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let report: SyncReport = serde_json::from_str(&content)
                .with_context(|| format!("invalid sync report {}", path.display()))?;
            content_of(report).with_context(|| format!("unusable sync report {}", path.display()))
        })
        .collect()
}

fn content_of(report: SyncReport) -> anyhow::Result<DeploymentContent> {
    if report.dry_run {
        bail!("report for {} is from a dry run", report.prefix);
    }
    if !report.is_complete() {
        bail!(
            "report for {} is incomplete: {} failed, {} not attempted",
            report.prefix,
            report.failed.len(),
            report.not_attempted.len()
        );
    }
    let mut assets = report.uploaded;
    assets.extend(report.skipped);
    assets.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(DeploymentContent {
        prefix: report.prefix,
        assets,
    })
}
