//! Settings validation.
//!
//! These are the only rules enforced locally; everything else is checked by
//! the provider at deployment time.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::warn;

use crate::{ConfigError, ConfigResult, ProjectConfig, Settings};

static ACCOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{12}$").unwrap());

static REGION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").unwrap());

static STACK_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]*$").unwrap());

static DNS_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").unwrap());

static CONNECTION_ARN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-z-]*:(codestar-connections|codeconnections):[^:]*:[^:]*:connection/.+$")
        .unwrap()
});

const MAX_DOMAIN_LEN: usize = 253;

/// The record label for a domain name: everything before the first `.`.
///
/// `"app.example.com"` yields `"app"`.
pub fn subdomain_label(domain: &str) -> &str {
    domain
        .split_once('.')
        .map_or(domain, |(label, _)| label)
}

/// Check every business rule of a settings document.
pub fn validate_settings(settings: &Settings) -> ConfigResult<()> {
    if !ACCOUNT_REGEX.is_match(&settings.aws_account_id) {
        return Err(ConfigError::invalid(
            "awsAccountId",
            format!("expected 12 digits, got '{}'", settings.aws_account_id),
        ));
    }

    if !REGION_REGEX.is_match(&settings.region) {
        return Err(ConfigError::invalid(
            "region",
            format!("'{}' is not a region name", settings.region),
        ));
    }

    if settings.projects.is_empty() {
        warn!("Settings declare no projects; nothing will be synthesized");
    }

    // Stack names end up lower-cased in account-wide resource names.
    let mut names = HashSet::new();
    for (index, project) in settings.projects.iter().enumerate() {
        validate_project(index, project)?;
        if !names.insert(project.project_name.to_ascii_lowercase()) {
            return Err(ConfigError::Duplicate(format!(
                "project '{}'",
                project.project_name
            )));
        }
    }

    Ok(())
}

fn validate_project(index: usize, project: &ProjectConfig) -> ConfigResult<()> {
    let field = |name: &str| format!("projects[{}].{}", index, name);

    let required = [
        ("projectName", &project.project_name),
        ("codestarARN", &project.codestar_arn),
        ("rootDomainName", &project.root_domain_name),
        ("containerName", &project.container_name),
        ("githubOwner", &project.github_owner),
        ("githubRepo", &project.github_repo),
        ("branch", &project.branch),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(field(name)));
        }
    }

    if !STACK_NAME_REGEX.is_match(&project.project_name) {
        return Err(ConfigError::invalid(
            field("projectName"),
            "only letters, digits and '-' are allowed",
        ));
    }

    if !CONNECTION_ARN_REGEX.is_match(&project.codestar_arn) {
        return Err(ConfigError::invalid(
            field("codestarARN"),
            format!("'{}' is not a connection ARN", project.codestar_arn),
        ));
    }

    if project.container_port == 0 {
        return Err(ConfigError::invalid(
            field("containerPort"),
            "must be between 1 and 65535",
        ));
    }

    if !is_domain_name(&project.root_domain_name) {
        return Err(ConfigError::invalid(
            field("rootDomainName"),
            format!("'{}' is not a domain name", project.root_domain_name),
        ));
    }

    if project.domain_names.is_empty() {
        return Err(ConfigError::MissingField(field("domainNames")));
    }

    let zone_suffix = format!(".{}", project.root_domain_name.to_ascii_lowercase());
    let mut seen = HashSet::new();
    let mut labels = HashSet::new();
    for domain in &project.domain_names {
        if !is_domain_name(domain) {
            return Err(ConfigError::invalid(
                field("domainNames"),
                format!("'{}' is not a domain name", domain),
            ));
        }

        let lowered = domain.to_ascii_lowercase();
        if !lowered.ends_with(&zone_suffix) {
            return Err(ConfigError::invalid(
                field("domainNames"),
                format!(
                    "'{}' is not inside the '{}' zone",
                    domain, project.root_domain_name
                ),
            ));
        }

        if !seen.insert(lowered.clone()) {
            return Err(ConfigError::Duplicate(format!("domain name '{}'", domain)));
        }

        let label = subdomain_label(&lowered).to_string();
        if !labels.insert(label.clone()) {
            return Err(ConfigError::Duplicate(format!(
                "record '{}.{}' (from domain name '{}')",
                label, project.root_domain_name, domain
            )));
        }

        // The alias record only keeps the first label, so deeper names lose
        // their middle labels.
        let relative = &lowered[..lowered.len() - zone_suffix.len()];
        if relative.contains('.') {
            warn!(
                project = %project.project_name,
                %domain,
                record = %format!("{}.{}", subdomain_label(domain), project.root_domain_name),
                "Nested domain name is published under its first label only"
            );
        }
    }

    if let Some(zone_id) = &project.hosted_zone_id {
        if zone_id.trim().is_empty() {
            return Err(ConfigError::invalid(field("hostedZoneId"), "must not be empty"));
        }
    }

    Ok(())
}

fn is_domain_name(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_DOMAIN_LEN {
        return false;
    }
    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    labels.iter().enumerate().all(|(i, label)| {
        DNS_LABEL_REGEX.is_match(label) || (i == 0 && *label == "*")
    })
}
