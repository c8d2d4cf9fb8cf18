//! KDL settings documents.
//!
//! ```kdl
//! aws-account-id "123456789012"
//! region "us-east-1"
//!
//! project "web" {
//!     codestar-arn "arn:aws:codestar-connections:us-east-1:123456789012:connection/abc"
//!     domain-names "app.example.com" "www.example.com"
//!     root-domain-name "example.com"
//!     container-port 8080
//!     container-name "web"
//!     github-owner "acme"
//!     github-repo "web"
//!     branch "main"
//! }
//! ```

use kdl::{KdlDocument, KdlNode};

use crate::{ConfigError, ConfigResult, ProjectConfig, Settings};

/// Parse a settings document from KDL text. The result is not validated.
pub fn parse_kdl(kdl: &str) -> ConfigResult<Settings> {
    let doc: KdlDocument = kdl.parse()?;

    let mut account = None;
    let mut region = None;
    let mut projects = Vec::new();

    for node in doc.nodes() {
        match node.name().value() {
            "aws-account-id" => {
                account = get_first_string_arg(node).or_else(|| {
                    get_first_integer_arg(node).map(|n| format!("{:012}", n))
                });
            }
            "region" => {
                region = get_first_string_arg(node);
            }
            "project" => {
                projects.push(parse_project(node)?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    Ok(Settings {
        aws_account_id: account
            .ok_or_else(|| ConfigError::MissingField("aws-account-id".to_string()))?,
        region: region.ok_or_else(|| ConfigError::MissingField("region".to_string()))?,
        projects,
    })
}

fn parse_project(node: &KdlNode) -> ConfigResult<ProjectConfig> {
    let project_name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("project name".to_string()))?;

    let mut codestar_arn = None;
    let mut domain_names = Vec::new();
    let mut root_domain_name = None;
    let mut container_port = None;
    let mut container_name = None;
    let mut github_owner = None;
    let mut github_repo = None;
    let mut branch = None;
    let mut hosted_zone_id = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "codestar-arn" => codestar_arn = get_first_string_arg(child),
                "domain-names" | "domain-name" => {
                    domain_names.extend(get_all_string_args(child));
                }
                "root-domain-name" => root_domain_name = get_first_string_arg(child),
                "container-port" => container_port = Some(parse_port(child)?),
                "container-name" => container_name = get_first_string_arg(child),
                "github-owner" => github_owner = get_first_string_arg(child),
                "github-repo" => github_repo = get_first_string_arg(child),
                "branch" => branch = get_first_string_arg(child),
                "hosted-zone-id" => hosted_zone_id = get_first_string_arg(child),
                _ => {}
            }
        }
    }

    let missing = |field: &str| {
        ConfigError::MissingField(format!("{} for project '{}'", field, project_name))
    };

    Ok(ProjectConfig {
        codestar_arn: codestar_arn.ok_or_else(|| missing("codestar-arn"))?,
        domain_names,
        root_domain_name: root_domain_name.ok_or_else(|| missing("root-domain-name"))?,
        container_port: container_port.ok_or_else(|| missing("container-port"))?,
        container_name: container_name.ok_or_else(|| missing("container-name"))?,
        github_owner: github_owner.ok_or_else(|| missing("github-owner"))?,
        github_repo: github_repo.ok_or_else(|| missing("github-repo"))?,
        branch: branch.ok_or_else(|| missing("branch"))?,
        hosted_zone_id,
        project_name,
    })
}

fn parse_port(node: &KdlNode) -> ConfigResult<u16> {
    let value = get_first_integer_arg(node)
        .ok_or_else(|| ConfigError::invalid("container-port", "expected an integer"))?;
    u16::try_from(value).map_err(|_| {
        ConfigError::invalid("container-port", format!("{} is out of range", value))
    })
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_first_integer_arg(node: &KdlNode) -> Option<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}
