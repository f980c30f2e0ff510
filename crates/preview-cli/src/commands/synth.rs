use std::path::{Path, PathBuf};

use preview_core::PreviewConfig;
use preview_graph::{ResourceGraph, synthesize_with_content};
use serde_json::json;

use crate::Format;
use crate::commands::content::load_reports;

pub fn synth(config_path: &Path, reports: &[PathBuf], format: Format) -> anyhow::Result<()> {
    let config = PreviewConfig::from_file(config_path)?;
    let graph = synthesize_with_content(&config, &load_reports(reports)?)?;
    let rendered = match format {
        Format::Json => render_json(&graph)?,
        Format::Text => render_text(&graph)?,
    };
    println!("{rendered}");
    Ok(())
}

fn render_json(graph: &ResourceGraph) -> anyhow::Result<String> {
    let nodes: Vec<_> = graph.nodes().collect();
    let value = json!({
        "waves": graph.apply_order()?,
        "nodes": nodes,
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

fn render_text(graph: &ResourceGraph) -> anyhow::Result<String> {
    let mut lines = Vec::new();
    for (i, wave) in graph.apply_order()?.iter().enumerate() {
        lines.push(format!("wave {}:", i + 1));
        for id in wave {
            let Some(node) = graph.get(id) else {
                continue;
            };
            let deps: Vec<&str> = node.dependencies().into_iter().map(|d| d.as_str()).collect();
            if deps.is_empty() {
                lines.push(format!("  {id} ({})", node.kind));
            } else {
                lines.push(format!("  {id} ({}) after {}", node.kind, deps.join(", ")));
            }
        }
    }
    Ok(lines.join("\n"))
}
