//! IAM roles used by the task runtime, the pipeline and the build project.

use serde_json::Value;
use stackgen_core::iam::{PolicyDocument, PolicyStatement, assume_role_policy, managed_policy_arn};
use stackgen_core::intrinsic::{get_att, reference};
use stackgen_core::{LogicalId, Resource, Stack};

use crate::ComposeResult;

pub const ROLE_TYPE: &str = "AWS::IAM::Role";
pub const POLICY_TYPE: &str = "AWS::IAM::Policy";

const PIPELINE_ROLE_ACTIONS: &[&str] = &[
    "ecs:UpdateService",
    "ecs:DescribeServices",
    "ecs:DescribeTaskDefinition",
    "ecs:ListTasks",
    "ecs:DescribeTasks",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
    "ecr:CompleteLayerUpload",
    "ecr:UploadLayerPart",
    "ecr:InitiateLayerUpload",
    "ecr:PutImage",
    "ecr:GetAuthorizationToken",
    "logs:*",
    "s3:*",
    "codestar-connections:UseConnection",
];

const BUILD_ROLE_ACTIONS: &[&str] = &[
    "ecr:BatchCheckLayerAvailability",
    "ecr:DescribeImages",
    "ecr:DescribeRepositories",
    "ecr:ListImages",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
    "ecr:CompleteLayerUpload",
    "ecr:UploadLayerPart",
    "ecr:InitiateLayerUpload",
    "ecr:PutImage",
    "ecr:GetAuthorizationToken",
    "logs:*",
    "s3:*",
    "codestar-connections:UseConnection",
];

/// A role that has not been declared yet.
///
/// Statements can be added until [`RoleSpec::declare`] writes the role and its
/// default inline policy into a stack.
#[derive(Debug, Clone)]
pub struct RoleSpec {
    path: String,
    service: String,
    managed_policies: Vec<String>,
    statements: Vec<PolicyStatement>,
}

impl RoleSpec {
    pub fn new(path: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            service: service.into(),
            managed_policies: Vec::new(),
            statements: Vec::new(),
        }
    }

    pub fn with_managed_policy(mut self, name: impl Into<String>) -> Self {
        self.managed_policies.push(name.into());
        self
    }

    pub fn add_to_policy(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }

    /// Declare the role and, when it has statements, its default policy.
    pub fn declare(self, stack: &mut Stack) -> ComposeResult<Role> {
        let mut resource = Resource::new(ROLE_TYPE).with_property(
            "AssumeRolePolicyDocument",
            assume_role_policy(&self.service).to_value(),
        );
        if !self.managed_policies.is_empty() {
            let arns: Vec<Value> = self
                .managed_policies
                .iter()
                .map(|name| managed_policy_arn(name))
                .collect();
            resource = resource.with_property("ManagedPolicyArns", Value::Array(arns));
        }
        let id = stack.add(&format!("{}/Resource", self.path), resource)?;

        let policy = if self.statements.is_empty() {
            None
        } else {
            let policy_id = LogicalId::from_path(&format!("{}/DefaultPolicy/Resource", self.path));
            let document = self
                .statements
                .into_iter()
                .fold(PolicyDocument::new(), |doc, s| doc.with_statement(s));
            let resource = Resource::new(POLICY_TYPE)
                .with_property("PolicyDocument", document.to_value())
                .with_property("PolicyName", Value::String(policy_id.to_string()))
                .with_property("Roles", Value::Array(vec![reference(&id)]));
            Some(stack.add(&format!("{}/DefaultPolicy/Resource", self.path), resource)?)
        };

        Ok(Role { id, policy })
    }
}

/// A declared role.
#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub id: LogicalId,
    /// Default inline policy, if the role has one.
    pub policy: Option<LogicalId>,
}

impl Role {
    pub fn arn(&self) -> Value {
        get_att(&self.id, "Arn")
    }

    /// Resources acting as this role should wait for these to exist.
    pub fn dependencies(&self) -> Vec<&LogicalId> {
        std::iter::once(&self.id).chain(self.policy.as_ref()).collect()
    }
}

/// Role assumed by ECS to pull images and ship logs.
pub fn execution_role() -> RoleSpec {
    RoleSpec::new("ExecutionRole", "ecs-tasks.amazonaws.com")
        .with_managed_policy("service-role/AmazonECSTaskExecutionRolePolicy")
}

/// Role assumed by the pipeline.
pub fn pipeline_role() -> RoleSpec {
    let mut role = RoleSpec::new("PipelineRole", "codepipeline.amazonaws.com")
        .with_managed_policy("AWSCodePipeline_FullAccess")
        .with_managed_policy("AmazonECS_FullAccess")
        .with_managed_policy("AmazonEC2FullAccess")
        .with_managed_policy("AmazonS3FullAccess");
    role.add_to_policy(
        PolicyStatement::allow()
            .actions(PIPELINE_ROLE_ACTIONS.iter().copied())
            .all_resources(),
    );
    role
}

/// Role assumed by the build project.
pub fn build_role() -> RoleSpec {
    let mut role = RoleSpec::new("BuildRole", "codebuild.amazonaws.com");
    role.add_to_policy(
        PolicyStatement::allow()
            .actions(BUILD_ROLE_ACTIONS.iter().copied())
            .all_resources(),
    );
    role
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackgen_core::Environment;

    fn stack() -> Stack {
        Stack::new("Test", Environment::new("123456789012", "us-east-1"))
    }

    #[test]
    fn test_execution_role_has_no_inline_policy() {
        let mut stack = stack();
        let role = execution_role().declare(&mut stack).unwrap();
        assert!(role.policy.is_none());

        let resource = stack.template.resource(&role.id).unwrap();
        assert_eq!(
            resource.property("AssumeRolePolicyDocument").unwrap()["Statement"][0]["Principal"],
            json!({ "Service": "ecs-tasks.amazonaws.com" })
        );
        assert_eq!(
            resource.property("ManagedPolicyArns").unwrap()[0]["Fn::Join"][1][2],
            json!(":iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy")
        );
    }

    #[test]
    fn test_pipeline_role_policies() {
        let mut stack = stack();
        let role = pipeline_role().declare(&mut stack).unwrap();

        let resource = stack.template.resource(&role.id).unwrap();
        assert_eq!(
            resource.property("ManagedPolicyArns").unwrap().as_array().unwrap().len(),
            4
        );

        let policy = stack
            .template
            .resource(role.policy.as_ref().unwrap())
            .unwrap();
        let actions = &policy.property("PolicyDocument").unwrap()["Statement"][0]["Action"];
        assert_eq!(actions.as_array().unwrap().len(), PIPELINE_ROLE_ACTIONS.len());
        assert!(actions.as_array().unwrap().contains(&json!("ecs:UpdateService")));
        assert_eq!(
            policy.property("Roles").unwrap(),
            &json!([{ "Ref": role.id }])
        );
    }

    #[test]
    fn test_build_role_has_no_managed_policies() {
        let mut stack = stack();
        let role = build_role().declare(&mut stack).unwrap();
        let resource = stack.template.resource(&role.id).unwrap();
        assert!(resource.property("ManagedPolicyArns").is_none());
        assert_eq!(role.dependencies().len(), 2);
    }

    #[test]
    fn test_added_statements_land_in_default_policy() {
        let mut stack = stack();
        let mut spec = build_role();
        spec.add_to_policy(
            PolicyStatement::allow()
                .actions(["s3:GetObject"])
                .resource(json!("arn:aws:s3:::bucket/*")),
        );
        let role = spec.declare(&mut stack).unwrap();
        let policy = stack
            .template
            .resource(role.policy.as_ref().unwrap())
            .unwrap();
        let statements = policy.property("PolicyDocument").unwrap()["Statement"]
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[1]["Action"], json!("s3:GetObject"));
    }
}
