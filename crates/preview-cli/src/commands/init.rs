use std::path::Path;

use anyhow::{Context, bail};
use preview_core::PreviewConfig;

pub const CONFIG_FILE: &str = "preview.toml";

pub fn init(path: &Path, name: &str, bucket: &str, force: bool) -> anyhow::Result<()> {
    let output = path.join(CONFIG_FILE);
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let config = PreviewConfig::scaffold(name, bucket);
    config.validate()?;
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    std::fs::write(&output, config.to_toml_string()?)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("✓ Generated {}", output.display());
    Ok(())
}
