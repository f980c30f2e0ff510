use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use preview_core::PreviewConfig;
use preview_graph::{
    ApplyOptions, ApplyReport, Applier, MemoryControlPlane, State, synthesize_with_content,
};
use tracing::{info, warn};

use crate::Format;
use crate::commands::content::load_reports;
use crate::commands::plan::load_state;

/// Apply the graph against the simulated control plane and record state.
///
/// State is written even when the apply fails part way, so the next run
/// resumes from the last node that succeeded.
pub async fn apply(
    config_path: &Path,
    state_path: &Path,
    reports: &[PathBuf],
    format: Format,
) -> anyhow::Result<()> {
    let report = run(config_path, state_path, reports).await?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print!("{}", format_report(&report)),
    }
    Ok(())
}

pub async fn run(
    config_path: &Path,
    state_path: &Path,
    reports: &[PathBuf],
) -> anyhow::Result<ApplyReport> {
    let config = PreviewConfig::from_file(config_path)?;
    let graph = synthesize_with_content(&config, &load_reports(reports)?)?;
    let mut state = load_state(state_path)?;

    warn!("no cloud control plane is configured; applying against the in-memory simulation");
    let applier = Applier::new(
        Arc::new(MemoryControlPlane::new()),
        ApplyOptions::from_domain(config.domain.as_ref()),
    );
    let result = applier.apply(&graph, &mut state).await;

    save_state(state_path, &state)?;
    info!(state = %state_path.display(), resources = state.resources.len(), "state written");
    Ok(result?)
}

pub fn save_state(path: &Path, state: &State) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

pub fn format_report(report: &ApplyReport) -> String {
    let mut out = String::new();
    for id in &report.created {
        out.push_str(&format!("  + {id}\n"));
    }
    for id in &report.updated {
        out.push_str(&format!("  ~ {id}\n"));
    }
    for id in &report.orphaned {
        out.push_str(&format!("  ! {id} is recorded but no longer declared (left in place)\n"));
    }
    out.push_str(&format!(
        "Applied: {} created, {} updated, {} unchanged.\n",
        report.created.len(),
        report.updated.len(),
        report.unchanged.len()
    ));
    out
}
