//! Compare freshly synthesized templates with a previously written assembly.

use anyhow::{Context, Result};
use stackgen_core::{CloudAssembly, Template, diff::TemplateDiff};
use std::collections::BTreeMap;
use std::path::Path;

/// Per-stack differences, keyed by stack name.
#[derive(Debug, Default)]
pub struct AssemblyDiff {
    pub stacks: BTreeMap<String, TemplateDiff>,
}

impl AssemblyDiff {
    /// Compare `assembly` against templates previously read from disk.
    ///
    /// A stack missing on disk diffs against an empty template, and a stack
    /// only found on disk shows up as removed entirely.
    pub fn between(deployed: &BTreeMap<String, Template>, assembly: &CloudAssembly) -> Self {
        let empty = Template::new();
        let mut stacks: BTreeMap<String, TemplateDiff> = assembly
            .stacks
            .iter()
            .map(|stack| {
                let old = deployed.get(&stack.name).unwrap_or(&empty);
                (stack.name.clone(), TemplateDiff::between(old, &stack.template))
            })
            .collect();

        for (name, old) in deployed {
            if assembly.stack(name).is_none() {
                stacks.insert(name.clone(), TemplateDiff::between(old, &empty));
            }
        }
        Self { stacks }
    }

    pub fn has_changes(&self) -> bool {
        self.stacks.values().any(|d| !d.is_empty())
    }

    /// Human-readable report, one block per stack.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, diff) in &self.stacks {
            out.push_str(&format!("Stack {}\n", name));
            if diff.is_empty() {
                out.push_str("  no differences\n");
                continue;
            }
            for change in diff.changes() {
                out.push_str(&format!(
                    "  [{}] {} {}\n",
                    change.action, change.resource_type, change.logical_id
                ));
            }
        }
        out
    }
}

/// Print the differences and return whether there were any.
pub fn run(settings_path: &Path, output: &Path, stack: Option<&str>) -> Result<bool> {
    let settings = super::load(settings_path)?;
    let assembly = super::synthesize(&settings, stack)?;

    let mut deployed = CloudAssembly::load_templates(output)
        .with_context(|| format!("Failed to read cloud assembly from {}", output.display()))?;
    if let Some(name) = stack {
        deployed.retain(|deployed_name, _| deployed_name == name);
    }

    let diff = AssemblyDiff::between(&deployed, &assembly);
    print!("{}", diff.render());
    Ok(diff.has_changes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgen_core::{Environment, Resource, Stack};

    fn stack(name: &str, resources: &[(&str, &str)]) -> Stack {
        let mut stack = Stack::new(name, Environment::new("123456789012", "us-east-1"));
        for (path, resource_type) in resources {
            stack.add(path, Resource::new(*resource_type)).unwrap();
        }
        stack
    }

    #[test]
    fn test_missing_stack_is_all_additions() {
        let mut assembly = CloudAssembly::new();
        assembly
            .push(stack("Project-web", &[("Vpc/Resource", "AWS::EC2::VPC")]))
            .unwrap();

        let diff = AssemblyDiff::between(&BTreeMap::new(), &assembly);
        assert!(diff.has_changes());
        assert_eq!(diff.stacks["Project-web"].to_add.len(), 1);
        assert!(diff.render().contains("[+] AWS::EC2::VPC Vpc"));
    }

    #[test]
    fn test_unchanged_assembly() {
        let web = stack("Project-web", &[("Vpc/Resource", "AWS::EC2::VPC")]);
        let mut deployed = BTreeMap::new();
        deployed.insert(web.name.clone(), web.template.clone());

        let mut assembly = CloudAssembly::new();
        assembly.push(web).unwrap();

        let diff = AssemblyDiff::between(&deployed, &assembly);
        assert!(!diff.has_changes());
        assert_eq!(diff.render(), "Stack Project-web\n  no differences\n");
    }

    #[test]
    fn test_removed_resource_reported() {
        let old = stack(
            "Project-web",
            &[("Vpc/Resource", "AWS::EC2::VPC"), ("EcsCluster/Resource", "AWS::ECS::Cluster")],
        );
        let mut deployed = BTreeMap::new();
        deployed.insert(old.name.clone(), old.template);

        let mut assembly = CloudAssembly::new();
        assembly
            .push(stack("Project-web", &[("Vpc/Resource", "AWS::EC2::VPC")]))
            .unwrap();

        let diff = AssemblyDiff::between(&deployed, &assembly);
        let removed = &diff.stacks["Project-web"].to_remove;
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].resource_type, "AWS::ECS::Cluster");
    }

    #[test]
    fn test_stack_only_on_disk_reported_as_removed() {
        let web = stack("Project-web", &[("Vpc/Resource", "AWS::EC2::VPC")]);
        let api = stack(
            "Project-api",
            &[("Vpc/Resource", "AWS::EC2::VPC"), ("EcsCluster/Resource", "AWS::ECS::Cluster")],
        );
        let mut deployed = BTreeMap::new();
        deployed.insert(web.name.clone(), web.template.clone());
        deployed.insert(api.name.clone(), api.template.clone());

        let mut assembly = CloudAssembly::new();
        assembly.push(web).unwrap();

        let diff = AssemblyDiff::between(&deployed, &assembly);
        assert!(diff.has_changes());
        assert!(diff.stacks["Project-web"].is_empty());
        assert_eq!(diff.stacks["Project-api"].to_remove.len(), 2);
        assert!(diff.render().contains("[-] AWS::ECS::Cluster EcsCluster"));
    }

    #[test]
    fn test_single_stack_synth_keeps_full_diff_clean() {
        let dir = std::env::temp_dir().join(format!("stackgen-diff-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        let mut full = CloudAssembly::new();
        full.push(stack("Project-web", &[("Vpc/Resource", "AWS::EC2::VPC")]))
            .unwrap();
        full.push(stack("Project-api", &[("Vpc/Resource", "AWS::EC2::VPC")]))
            .unwrap();
        full.write_to(&dir).unwrap();

        full.clone().select("Project-web").unwrap().merge_into(&dir).unwrap();

        let deployed = CloudAssembly::load_templates(&dir).unwrap();
        let diff = AssemblyDiff::between(&deployed, &full);
        assert!(!diff.has_changes(), "{}", diff.render());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
