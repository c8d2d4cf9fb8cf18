//! The cloud assembly: synthesized templates plus a manifest, written to disk.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{Error, Result, Stack, Template};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1";
pub const STACK_ARTIFACT_TYPE: &str = "aws:cloudformation:stack";

/// Manifest describing every stack artifact in an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub version: String,
    pub artifacts: BTreeMap<String, ArtifactEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    #[serde(rename = "type")]
    pub artifact_type: String,
    pub environment: String,
    pub template_file: String,
    /// SHA-256 of the template file contents.
    pub template_hash: String,
}

/// All stacks produced by one synthesis run, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloudAssembly {
    pub stacks: Vec<Stack>,
}

impl CloudAssembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stack: Stack) -> Result<()> {
        if self.stack(&stack.name).is_some() {
            return Err(Error::InvalidInput(format!(
                "stack '{}' declared twice",
                stack.name
            )));
        }
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stack(&self, name: &str) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.name == name)
    }

    /// Keep only the named stack.
    pub fn select(mut self, name: &str) -> Result<Self> {
        self.stacks.retain(|s| s.name == name);
        if self.stacks.is_empty() {
            return Err(Error::NotFound(format!("stack '{}'", name)));
        }
        Ok(self)
    }

    pub fn manifest(&self) -> Result<Manifest> {
        let mut artifacts = BTreeMap::new();
        for stack in &self.stacks {
            artifacts.insert(
                stack.name.clone(),
                ArtifactEntry {
                    artifact_type: STACK_ARTIFACT_TYPE.to_string(),
                    environment: stack.environment.to_string(),
                    template_file: stack.template_file(),
                    template_hash: stack.template.fingerprint()?,
                },
            );
        }
        Ok(Manifest {
            version: MANIFEST_VERSION.to_string(),
            artifacts,
        })
    }

    /// Write every template and the manifest into `dir`, returning the written paths.
    ///
    /// The manifest is replaced, so stacks missing from this assembly drop out of it.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let manifest = self.manifest()?;
        self.write_with_manifest(dir, manifest)
    }

    /// Like [`CloudAssembly::write_to`], but keep manifest entries of stacks
    /// that are not part of this assembly.
    pub fn merge_into(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut manifest = match read_manifest(dir)? {
            Some(existing) => existing,
            None => Manifest {
                version: MANIFEST_VERSION.to_string(),
                artifacts: BTreeMap::new(),
            },
        };
        manifest.artifacts.extend(self.manifest()?.artifacts);
        self.write_with_manifest(dir, manifest)
    }

    fn write_with_manifest(&self, dir: &Path, manifest: Manifest) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::with_capacity(self.stacks.len() + 1);
        for stack in &self.stacks {
            let path = dir.join(stack.template_file());
            std::fs::write(&path, stack.template.to_json()?)?;
            debug!(stack = %stack.name, path = %path.display(), "Wrote template");
            written.push(path);
        }

        let manifest_path = dir.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
        written.push(manifest_path);

        info!(
            dir = %dir.display(),
            stacks = self.stacks.len(),
            artifacts = manifest.artifacts.len(),
            "Cloud assembly written"
        );
        Ok(written)
    }

    /// Read previously written templates back, keyed by stack name.
    ///
    /// A directory without a manifest holds no templates.
    pub fn load_templates(dir: &Path) -> Result<BTreeMap<String, Template>> {
        let Some(manifest) = read_manifest(dir)? else {
            return Ok(BTreeMap::new());
        };

        let mut templates = BTreeMap::new();
        for (name, entry) in manifest.artifacts {
            if entry.artifact_type != STACK_ARTIFACT_TYPE {
                continue;
            }
            let json = std::fs::read_to_string(dir.join(&entry.template_file))?;
            templates.insert(name, Template::from_json(&json)?);
        }
        Ok(templates)
    }
}

fn read_manifest(dir: &Path) -> Result<Option<Manifest>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&std::fs::read_to_string(&path)?)?))
}
