//! CLI command implementations.

pub mod diff;
pub mod synth;

use anyhow::{Context, Result};
use stackgen_compose::{App, stack_name};
use stackgen_config::{Settings, load_settings};
use stackgen_core::{CloudAssembly, Environment};
use std::path::Path;

pub(crate) fn load(path: &Path) -> Result<Settings> {
    load_settings(path).with_context(|| format!("Failed to load settings from {}", path.display()))
}

/// Synthesize every project, or only `stack` when given.
pub(crate) fn synthesize(settings: &Settings, stack: Option<&str>) -> Result<CloudAssembly> {
    let assembly = App::new()
        .synth(settings)
        .context("Failed to synthesize stacks")?;

    match stack {
        Some(name) => assembly
            .select(name)
            .with_context(|| format!("No stack named '{}'", name)),
        None => Ok(assembly),
    }
}

pub fn list(settings_path: &Path) -> Result<()> {
    let settings = load(settings_path)?;
    let environment = Environment::new(&settings.aws_account_id, &settings.region);

    for project in &settings.projects {
        println!("{}\t{}", stack_name(project), environment);
    }
    Ok(())
}

pub fn validate(settings_path: &Path) -> Result<()> {
    match load(settings_path) {
        Ok(settings) => {
            println!(
                "Settings are valid ({} project{})",
                settings.projects.len(),
                if settings.projects.len() == 1 { "" } else { "s" }
            );
            Ok(())
        }
        Err(e) => {
            println!("Settings error: {:#}", e);
            std::process::exit(1);
        }
    }
}
