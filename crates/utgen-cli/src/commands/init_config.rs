//! `utgen init-config`

use anyhow::{bail, Context};
use std::path::Path;
use utgen_core::GeneratorConfig;

pub(crate) fn run(path: &Path, force: bool) -> anyhow::Result<i32> {
    write_sample(path, force)?;
    println!("Wrote sample configuration to {}", path.display());
    println!("Set OPENAI_API_KEY or GITHUB_TOKEN instead of storing keys in the file.");
    Ok(0)
}

fn write_sample(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let yaml = GeneratorConfig::default().to_yaml()?;
    std::fs::write(path, yaml).with_context(|| format!("writing {}", path.display()))
}
