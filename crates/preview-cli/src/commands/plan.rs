use std::path::{Path, PathBuf};

use anyhow::Context;
use preview_core::PreviewConfig;
use preview_graph::{Action, Plan, State, plan as diff, synthesize_with_content};

use crate::Format;
use crate::commands::content::load_reports;

pub fn plan(
    config_path: &Path,
    state_path: &Path,
    reports: &[PathBuf],
    format: Format,
) -> anyhow::Result<()> {
    let config = PreviewConfig::from_file(config_path)?;
    let graph = synthesize_with_content(&config, &load_reports(reports)?)?;
    let state = load_state(state_path)?;
    let plan = diff(&graph, &state)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
        Format::Text => print!("{}", format_plan(&plan)),
    }
    Ok(())
}

/// Read recorded state, as written by `preview apply`; a missing file is an
/// empty state.
pub fn load_state(path: &Path) -> anyhow::Result<State> {
    if !path.exists() {
        return Ok(State::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("invalid state file {}", path.display()))
}

pub fn format_plan(plan: &Plan) -> String {
    let mut out = String::new();
    for change in &plan.changes {
        let line = match &change.action {
            Action::Create => format!("  + {} ({})\n", change.id, change.kind),
            Action::Update { changed } => {
                format!("  ~ {} ({}): {}\n", change.id, change.kind, changed.join(", "))
            }
            Action::NoOp => format!("    {} ({})\n", change.id, change.kind),
        };
        out.push_str(&line);
    }
    for id in &plan.orphaned {
        out.push_str(&format!("  ! {id} is recorded but no longer declared (left in place)\n"));
    }

    let (create, update, noop) = plan.counts();
    if plan.is_noop() {
        out.push_str("No changes.\n");
    } else {
        out.push_str(&format!(
            "Plan: {create} to create, {update} to update, {noop} unchanged.\n"
        ));
    }
    out
}
