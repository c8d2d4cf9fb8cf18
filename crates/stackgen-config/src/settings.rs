//! The settings document.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::validate::validate_settings;
use crate::{ConfigError, ConfigResult};

/// Top-level settings: where to deploy and what to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Target AWS account (12 digits).
    pub aws_account_id: String,
    /// Target region, e.g. `us-east-1`.
    pub region: String,
    /// One stack is synthesized per project, in this order.
    pub projects: Vec<ProjectConfig>,
}

/// Everything needed to compose one project's stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Stack name suffix (`Project-<name>`).
    pub project_name: String,
    /// ARN of the CodeStar connection used by the source stage.
    #[serde(rename = "codestarARN")]
    pub codestar_arn: String,
    /// Additional domain names served by the load balancer.
    pub domain_names: Vec<String>,
    /// Apex domain; also names the hosted zone.
    pub root_domain_name: String,
    pub container_port: u16,
    pub container_name: String,
    pub github_owner: String,
    pub github_repo: String,
    pub branch: String,
    /// Hosted zone of `root_domain_name`, if known. Enables automatic DNS
    /// validation of certificates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone_id: Option<String>,
}

impl ProjectConfig {
    /// `owner/repo`, as the source connector expects it.
    pub fn full_repository_id(&self) -> String {
        format!("{}/{}", self.github_owner, self.github_repo)
    }
}

/// Parse settings from JSON text without validating them.
pub fn parse_json(json: &str) -> ConfigResult<Settings> {
    Ok(serde_json::from_str(json)?)
}

/// Load and validate settings, choosing the format from the file extension.
pub fn load_settings(path: &Path) -> ConfigResult<Settings> {
    let content = std::fs::read_to_string(path)?;

    let settings = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_json(&content)?,
        Some("kdl") => crate::kdl_format::parse_kdl(&content)?,
        other => {
            return Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            ));
        }
    };

    validate_settings(&settings)?;

    info!(
        path = %path.display(),
        account = %settings.aws_account_id,
        region = %settings.region,
        projects = settings.projects.len(),
        "Loaded settings"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SETTINGS: &str = r#"{
        "awsAccountId": "123456789012",
        "region": "us-east-1",
        "projects": [
            {
                "projectName": "web",
                "codestarARN": "arn:aws:codestar-connections:us-east-1:123456789012:connection/abc",
                "domainNames": ["app.example.com", "www.example.com"],
                "rootDomainName": "example.com",
                "containerPort": 8080,
                "containerName": "web",
                "githubOwner": "acme",
                "githubRepo": "web",
                "branch": "main"
            }
        ]
    }"#;

    #[test]
    fn test_parse_json_settings() {
        let settings = parse_json(SETTINGS).unwrap();
        assert_eq!(settings.aws_account_id, "123456789012");
        assert_eq!(settings.projects.len(), 1);

        let project = &settings.projects[0];
        assert_eq!(project.container_port, 8080);
        assert_eq!(project.domain_names, vec!["app.example.com", "www.example.com"]);
        assert_eq!(project.full_repository_id(), "acme/web");
        assert_eq!(project.hosted_zone_id, None);
    }

    #[test]
    fn test_port_out_of_range_is_parse_error() {
        let json = SETTINGS.replace("8080", "70000");
        assert!(matches!(parse_json(&json), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_missing_field_is_parse_error() {
        let json = SETTINGS.replace(r#""branch": "main""#, r#""unused": "x""#);
        assert!(parse_json(&json).is_err());
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let path = std::env::temp_dir().join(format!("stackgen-settings-{}.yaml", std::process::id()));
        std::fs::write(&path, SETTINGS).unwrap();
        let result = load_settings(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(ext)) if ext == "yaml"));
    }

    #[test]
    fn test_load_json_file() {
        let path = std::env::temp_dir().join(format!("stackgen-settings-{}.json", std::process::id()));
        std::fs::write(&path, SETTINGS).unwrap();
        let result = load_settings(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(result.unwrap().projects[0].project_name, "web");
    }

    #[test]
    fn test_load_kdl_file() {
        let kdl = r#"
aws-account-id "123456789012"
region "us-east-1"

project "api" {
    codestar-arn "arn:aws:codestar-connections:us-east-1:123456789012:connection/abc"
    domain-names "api.example.com"
    root-domain-name "example.com"
    container-port 8080
    container-name "api"
    github-owner "acme"
    github-repo "api"
    branch "main"
}
"#;
        let path = std::env::temp_dir().join(format!("stackgen-settings-{}.kdl", std::process::id()));
        std::fs::write(&path, kdl).unwrap();
        let result = load_settings(&path);
        std::fs::remove_file(&path).unwrap();

        let settings = result.unwrap();
        assert_eq!(settings.projects.len(), 1);
        assert_eq!(settings.projects[0].project_name, "api");
        assert_eq!(settings.projects[0].container_port, 8080);
    }
}

