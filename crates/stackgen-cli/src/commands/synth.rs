//! Write the cloud assembly.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub fn run(settings_path: &Path, output: &Path, stack: Option<&str>) -> Result<()> {
    let settings = super::load(settings_path)?;
    let assembly = super::synthesize(&settings, stack)?;

    // A single stack must not evict the others from the manifest.
    let written = match stack {
        Some(_) => assembly.merge_into(output),
        None => assembly.write_to(output),
    }
    .with_context(|| format!("Failed to write cloud assembly to {}", output.display()))?;

    for path in &written {
        println!("{}", path.display());
    }
    info!(files = written.len(), output = %output.display(), "Synthesis finished");
    Ok(())
}
