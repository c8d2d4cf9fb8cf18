//! Container image registry.

use serde_json::{Value, json};
use stackgen_core::iam::PolicyStatement;
use stackgen_core::intrinsic::{ACCOUNT_ID, REGION, URL_SUFFIX, get_att, sub};
use stackgen_core::{DeletionPolicy, LogicalId, Resource, Stack};

use crate::ComposeResult;

pub const REPOSITORY_TYPE: &str = "AWS::ECR::Repository";
pub const REPOSITORY_PREFIX: &str = "devops-test-repo-";

const PULL_ACTIONS: &[&str] = &[
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

const PUSH_ACTIONS: &[&str] = &[
    "ecr:CompleteLayerUpload",
    "ecr:UploadLayerPart",
    "ecr:InitiateLayerUpload",
    "ecr:PutImage",
];

/// Repository name for a stack: the prefix followed by the lower-cased stack id.
pub fn repository_name(stack_name: &str) -> String {
    format!("{}{}", REPOSITORY_PREFIX, stack_name.to_lowercase())
}

/// A declared image repository.
#[derive(Debug, Clone, PartialEq)]
pub struct Repository {
    pub id: LogicalId,
    pub name: String,
}

impl Repository {
    pub fn arn(&self) -> Value {
        get_att(&self.id, "Arn")
    }

    /// `<account>.dkr.ecr.<region>.<suffix>/<name>`
    pub fn uri(&self) -> Value {
        sub(&format!(
            "${{{}}}.dkr.ecr.${{{}}}.${{{}}}/${{{}}}",
            ACCOUNT_ID, REGION, URL_SUFFIX, self.id
        ))
    }

    /// Statements letting a principal pull and push images.
    pub fn pull_push_statements(&self) -> Vec<PolicyStatement> {
        vec![
            PolicyStatement::allow()
                .actions(PULL_ACTIONS.iter().chain(PUSH_ACTIONS).copied())
                .resource(self.arn()),
            PolicyStatement::allow()
                .actions(["ecr:GetAuthorizationToken"])
                .all_resources(),
        ]
    }
}

/// Declare the repository. It is emptied and deleted together with the stack.
pub fn declare_repository(stack: &mut Stack, name: &str) -> ComposeResult<Repository> {
    let id = stack.add(
        "EcrRepo/Resource",
        Resource::new(REPOSITORY_TYPE)
            .with_properties(json!({
                "EmptyOnDelete": true,
                "RepositoryName": name,
            }))
            .with_removal_policy(DeletionPolicy::Delete),
    )?;

    Ok(Repository {
        id,
        name: name.to_string(),
    })
}
