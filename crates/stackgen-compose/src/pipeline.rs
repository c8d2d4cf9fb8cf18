//! Delivery pipeline: Source → Build → Deploy.

use serde::Serialize;
use serde_json::{Value, json};
use stackgen_config::ProjectConfig;
use stackgen_core::iam::PolicyStatement;
use stackgen_core::intrinsic::{get_att, join, reference};
use stackgen_core::{DeletionPolicy, LogicalId, Resource, Stack};
use tracing::debug;

use crate::ComposeResult;
use crate::buildspec::{IMAGE_DEFINITIONS_FILE, build_environment, image_build_spec};
use crate::compute::Service;
use crate::registry::Repository;
use crate::roles::{self, Role};

pub const BUCKET_TYPE: &str = "AWS::S3::Bucket";
pub const BUILD_PROJECT_TYPE: &str = "AWS::CodeBuild::Project";
pub const PIPELINE_TYPE: &str = "AWS::CodePipeline::Pipeline";

pub const PIPELINE_NAME_PREFIX: &str = "DevOpsTestPipeline";
pub const BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:5.0";
pub const BUILD_COMPUTE_TYPE: &str = "BUILD_GENERAL1_SMALL";

const BUCKET_READ_WRITE_ACTIONS: &[&str] = &[
    "s3:GetObject*",
    "s3:GetBucket*",
    "s3:List*",
    "s3:DeleteObject*",
    "s3:PutObject",
    "s3:PutObjectLegalHold",
    "s3:PutObjectRetention",
    "s3:PutObjectTagging",
    "s3:PutObjectVersionTagging",
    "s3:Abort*",
];

/// Pipeline name for a project. Names are account-wide, so each project gets its own.
pub fn pipeline_name(project_name: &str) -> String {
    format!("{}-{}", PIPELINE_NAME_PREFIX, project_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionCategory {
    Source,
    Build,
    Deploy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionTypeId {
    pub category: ActionCategory,
    pub owner: &'static str,
    pub provider: &'static str,
    pub version: &'static str,
}

impl ActionTypeId {
    fn aws(category: ActionCategory, provider: &'static str) -> Self {
        Self {
            category,
            owner: "AWS",
            provider,
            version: "1",
        }
    }
}

/// A named artifact passed between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Artifact {
    pub name: String,
}

impl Artifact {
    /// Artifact produced by `action` in `stage`.
    pub fn output_of(stage: &str, action: &str) -> Self {
        Self {
            name: format!("Artifact_{}_{}", stage, action),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineAction {
    pub action_type_id: ActionTypeId,
    pub configuration: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_artifacts: Vec<Artifact>,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_artifacts: Vec<Artifact>,
    pub run_order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PipelineStage {
    pub actions: Vec<PipelineAction>,
    pub name: String,
}

/// Pull `owner/repo@branch` through a CodeStar connection.
pub fn codestar_source_action(project: &ProjectConfig, output: &Artifact) -> PipelineAction {
    PipelineAction {
        action_type_id: ActionTypeId::aws(ActionCategory::Source, "CodeStarSourceConnection"),
        configuration: json!({
            "BranchName": project.branch,
            "ConnectionArn": project.codestar_arn,
            "FullRepositoryId": project.full_repository_id(),
        }),
        input_artifacts: Vec::new(),
        name: "CodeStar_Source".to_string(),
        output_artifacts: vec![output.clone()],
        run_order: 1,
    }
}

pub fn codebuild_action(
    build_project: &LogicalId,
    input: &Artifact,
    output: &Artifact,
) -> PipelineAction {
    PipelineAction {
        action_type_id: ActionTypeId::aws(ActionCategory::Build, "CodeBuild"),
        configuration: json!({ "ProjectName": reference(build_project) }),
        input_artifacts: vec![input.clone()],
        name: "Build".to_string(),
        output_artifacts: vec![output.clone()],
        run_order: 1,
    }
}

/// Roll the service onto the image named in the image definitions file.
pub fn ecs_deploy_action(cluster: &LogicalId, service: &Service, input: &Artifact) -> PipelineAction {
    PipelineAction {
        action_type_id: ActionTypeId::aws(ActionCategory::Deploy, "ECS"),
        configuration: json!({
            "ClusterName": reference(cluster),
            "FileName": IMAGE_DEFINITIONS_FILE,
            "ServiceName": service.name(),
        }),
        input_artifacts: vec![input.clone()],
        name: "DeployToEcs".to_string(),
        output_artifacts: Vec::new(),
        run_order: 1,
    }
}

/// Everything the pipeline is wired to.
pub struct PipelineProps<'a> {
    pub project: &'a ProjectConfig,
    pub repository: &'a Repository,
    pub cluster: &'a LogicalId,
    pub service: &'a Service,
    pub name: String,
}

/// A declared pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryPipeline {
    pub id: LogicalId,
    pub name: String,
    pub artifact_bucket: LogicalId,
    pub build_project: LogicalId,
    pub pipeline_role: Role,
    pub build_role: Role,
    pub stages: Vec<PipelineStage>,
}

impl DeliveryPipeline {
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }
}

fn bucket_read_write(bucket: &LogicalId) -> PolicyStatement {
    let arn = get_att(bucket, "Arn");
    PolicyStatement::allow()
        .actions(BUCKET_READ_WRITE_ACTIONS.iter().copied())
        .resource(arn.clone())
        .resource(join("", vec![arn, json!("/*")]))
}

/// Declare the artifact bucket, both roles, the build project and the pipeline.
pub fn declare_delivery_pipeline(
    stack: &mut Stack,
    props: &PipelineProps<'_>,
) -> ComposeResult<DeliveryPipeline> {
    let artifact_bucket = stack.add(
        "ArtifactBucket/Resource",
        Resource::new(BUCKET_TYPE).with_removal_policy(DeletionPolicy::Delete),
    )?;

    let mut pipeline_role = roles::pipeline_role();
    pipeline_role.add_to_policy(bucket_read_write(&artifact_bucket));
    for statement in props.repository.pull_push_statements() {
        pipeline_role.add_to_policy(statement);
    }
    let pipeline_role = pipeline_role.declare(stack)?;

    let mut build_role = roles::build_role();
    build_role.add_to_policy(bucket_read_write(&artifact_bucket));
    let build_role = build_role.declare(stack)?;

    let build_spec = image_build_spec()
        .to_json()
        .map_err(stackgen_core::Error::from)?;
    let environment: Vec<Value> = build_environment(props.repository, &props.project.container_name)
        .iter()
        .map(|v| v.to_value())
        .collect();

    let mut build_resource = Resource::new(BUILD_PROJECT_TYPE).with_properties(json!({
        "Artifacts": { "Type": "CODEPIPELINE" },
        "Cache": { "Type": "NO_CACHE" },
        "EncryptionKey": "alias/aws/s3",
        "Environment": {
            "ComputeType": BUILD_COMPUTE_TYPE,
            "EnvironmentVariables": environment,
            "Image": BUILD_IMAGE,
            "ImagePullCredentialsType": "CODEBUILD",
            "PrivilegedMode": true,
            "Type": "LINUX_CONTAINER",
        },
        "ServiceRole": build_role.arn(),
        "Source": {
            "BuildSpec": build_spec,
            "Type": "CODEPIPELINE",
        },
    }));
    for dependency in build_role.dependencies() {
        build_resource = build_resource.depends_on(dependency);
    }
    let build_project = stack.add("BuildProject/Resource", build_resource)?;

    let source_output = Artifact::output_of("Source", "CodeStar_Source");
    let build_output = Artifact::output_of("Build", "Build");

    let stages = vec![
        PipelineStage {
            actions: vec![codestar_source_action(props.project, &source_output)],
            name: "Source".to_string(),
        },
        PipelineStage {
            actions: vec![codebuild_action(&build_project, &source_output, &build_output)],
            name: "Build".to_string(),
        },
        PipelineStage {
            actions: vec![ecs_deploy_action(props.cluster, props.service, &build_output)],
            name: "Deploy".to_string(),
        },
    ];

    let mut pipeline_resource = Resource::new(PIPELINE_TYPE).with_properties(json!({
        "ArtifactStore": {
            "Location": reference(&artifact_bucket),
            "Type": "S3",
        },
        "Name": props.name,
        "RoleArn": pipeline_role.arn(),
        "Stages": serde_json::to_value(&stages).map_err(stackgen_core::Error::from)?,
    }));
    for dependency in pipeline_role.dependencies() {
        pipeline_resource = pipeline_resource.depends_on(dependency);
    }
    let id = stack.add("Pipeline/Resource", pipeline_resource)?;

    debug!(stack = %stack.name, pipeline = %props.name, stages = stages.len(), "Declared pipeline");

    Ok(DeliveryPipeline {
        id,
        name: props.name.clone(),
        artifact_bucket,
        build_project,
        pipeline_role,
        build_role,
        stages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackgen_core::Environment;

    fn project() -> ProjectConfig {
        ProjectConfig {
            project_name: "web".to_string(),
            codestar_arn: "arn:aws:codestar-connections:us-east-1:123456789012:connection/abc"
                .to_string(),
            domain_names: vec!["app.example.com".to_string()],
            root_domain_name: "example.com".to_string(),
            container_port: 8080,
            container_name: "web".to_string(),
            github_owner: "acme".to_string(),
            github_repo: "web-app".to_string(),
            branch: "main".to_string(),
            hosted_zone_id: None,
        }
    }

    fn declare(stack: &mut Stack) -> DeliveryPipeline {
        let project = project();
        let repository = Repository {
            id: LogicalId::raw("EcrRepo"),
            name: "devops-test-repo-web".to_string(),
        };
        let cluster = LogicalId::raw("EcsCluster");
        let service = Service {
            id: LogicalId::raw("FargateService"),
            security_group: LogicalId::raw("FargateServiceSG"),
        };
        let props = PipelineProps {
            project: &project,
            repository: &repository,
            cluster: &cluster,
            service: &service,
            name: pipeline_name(&project.project_name),
        };
        declare_delivery_pipeline(stack, &props).unwrap()
    }

    fn stack() -> Stack {
        Stack::new("Project-web", Environment::new("123456789012", "us-east-1"))
    }

    #[test]
    fn test_pipeline_name() {
        assert_eq!(pipeline_name("web"), "DevOpsTestPipeline-web");
    }

    #[test]
    fn test_stages_in_order() {
        let mut stack = stack();
        let pipeline = declare(&mut stack);
        assert_eq!(pipeline.stage_names(), vec!["Source", "Build", "Deploy"]);

        let resource = stack.template.resource(&pipeline.id).unwrap();
        let stages = resource.property("Stages").unwrap().as_array().unwrap();
        let names: Vec<&str> = stages.iter().map(|s| s["Name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Source", "Build", "Deploy"]);
    }

    #[test]
    fn test_source_action_configuration() {
        let mut stack = stack();
        let pipeline = declare(&mut stack);
        let resource = stack.template.resource(&pipeline.id).unwrap();
        let source = &resource.property("Stages").unwrap()[0]["Actions"][0];

        assert_eq!(source["Name"], "CodeStar_Source");
        assert_eq!(source["ActionTypeId"]["Provider"], "CodeStarSourceConnection");
        assert_eq!(source["ActionTypeId"]["Category"], "Source");
        assert_eq!(source["Configuration"]["FullRepositoryId"], "acme/web-app");
        assert_eq!(source["Configuration"]["BranchName"], "main");
        assert_eq!(
            source["OutputArtifacts"][0]["Name"],
            "Artifact_Source_CodeStar_Source"
        );
        assert!(source.get("InputArtifacts").is_none());
    }

    #[test]
    fn test_deploy_reads_image_definitions() {
        let mut stack = stack();
        let pipeline = declare(&mut stack);
        let resource = stack.template.resource(&pipeline.id).unwrap();
        let deploy = &resource.property("Stages").unwrap()[2]["Actions"][0];

        assert_eq!(deploy["Name"], "DeployToEcs");
        assert_eq!(deploy["ActionTypeId"]["Provider"], "ECS");
        assert_eq!(deploy["Configuration"]["FileName"], "imagedefinitions.json");
        assert_eq!(deploy["Configuration"]["ClusterName"], json!({ "Ref": "EcsCluster" }));
        assert_eq!(
            deploy["InputArtifacts"][0]["Name"],
            "Artifact_Build_Build"
        );
    }

    #[test]
    fn test_build_project() {
        let mut stack = stack();
        let pipeline = declare(&mut stack);
        let project = stack.template.resource(&pipeline.build_project).unwrap();

        assert!(project.is_type(BUILD_PROJECT_TYPE));
        let environment = project.property("Environment").unwrap();
        assert_eq!(environment["Image"], BUILD_IMAGE);
        assert_eq!(environment["PrivilegedMode"], true);

        let names: Vec<&str> = environment["EnvironmentVariables"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["Name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["ECR_REPO_URI", "IMAGE_REPO_NAME", "IMAGE_TAG", "CONTAINER_NAME"]
        );

        let build_spec = project.property("Source").unwrap()["BuildSpec"].as_str().unwrap();
        assert!(build_spec.contains("imagedefinitions.json"));
        assert!(!project.depends_on.is_empty());
    }

    #[test]
    fn test_artifact_bucket_and_roles() {
        let mut stack = stack();
        let pipeline = declare(&mut stack);

        let bucket = stack.template.resource(&pipeline.artifact_bucket).unwrap();
        assert_eq!(bucket.deletion_policy, Some(DeletionPolicy::Delete));

        assert_eq!(stack.template.count_of_type(roles::ROLE_TYPE), 2);
        assert!(pipeline.pipeline_role.policy.is_some());
        assert!(pipeline.build_role.policy.is_some());

        let resource = stack.template.resource(&pipeline.id).unwrap();
        assert_eq!(resource.property("Name").unwrap(), "DevOpsTestPipeline-web");
        assert_eq!(
            resource.property("ArtifactStore").unwrap()["Location"],
            reference(&pipeline.artifact_bucket)
        );
    }
}
