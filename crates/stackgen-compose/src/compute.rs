//! Container runtime: ECS cluster, Fargate task definition and service.

use serde_json::{Value, json};
use stackgen_core::iam::PolicyStatement;
use stackgen_core::intrinsic::{REGION, get_att, pseudo, reference};
use stackgen_core::{DeletionPolicy, LogicalId, Resource, Stack};
use tracing::debug;

use crate::ComposeResult;
use crate::edge::{HttpsListener, LoadBalancer, SECURITY_GROUP_TYPE};
use crate::network::Vpc;
use crate::roles::{Role, RoleSpec};

pub const CLUSTER_TYPE: &str = "AWS::ECS::Cluster";
pub const TASK_DEFINITION_TYPE: &str = "AWS::ECS::TaskDefinition";
pub const SERVICE_TYPE: &str = "AWS::ECS::Service";

/// Placeholder image; the first pipeline run replaces it.
pub const SAMPLE_IMAGE: &str = "public.ecr.aws/ecs-sample-image/name-server:latest";
pub const LOG_STREAM_PREFIX: &str = "ecs";

/// What runs inside the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub port: u16,
    pub image: String,
    pub cpu: u32,
    pub memory_mib: u32,
}

impl ContainerSpec {
    /// A 0.25 vCPU / 512 MiB task.
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            image: SAMPLE_IMAGE.to_string(),
            cpu: 256,
            memory_mib: 512,
        }
    }
}

/// A declared task definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub id: LogicalId,
    pub log_group: LogicalId,
    pub execution_role: Role,
    pub task_role: Role,
    pub container_name: String,
    pub container_port: u16,
}

/// A declared Fargate service.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: LogicalId,
    pub security_group: LogicalId,
}

impl Service {
    pub fn name(&self) -> Value {
        get_att(&self.id, "Name")
    }
}

pub fn declare_cluster(stack: &mut Stack) -> ComposeResult<LogicalId> {
    Ok(stack.add("EcsCluster/Resource", Resource::new(CLUSTER_TYPE))?)
}

/// Declare the log group, task role and task definition.
///
/// The execution role is declared here because it needs write access to the
/// log group.
pub fn declare_task_definition(
    stack: &mut Stack,
    container: &ContainerSpec,
    mut execution_role: RoleSpec,
) -> ComposeResult<TaskDefinition> {
    let log_group = stack.add(
        "TaskDef/AppContainer/LogGroup/Resource",
        Resource::new("AWS::Logs::LogGroup").with_removal_policy(DeletionPolicy::Retain),
    )?;

    execution_role.add_to_policy(
        PolicyStatement::allow()
            .actions(["logs:CreateLogStream", "logs:PutLogEvents"])
            .resource(get_att(&log_group, "Arn")),
    );
    let execution_role = execution_role.declare(stack)?;
    let task_role = RoleSpec::new("TaskDef/TaskRole", "ecs-tasks.amazonaws.com").declare(stack)?;

    let family = format!("{}TaskDef", stack.name.replace('-', ""));

    let id = stack.add(
        "TaskDef/Resource",
        Resource::new(TASK_DEFINITION_TYPE).with_properties(json!({
            "ContainerDefinitions": [{
                "Essential": true,
                "Image": container.image,
                "LogConfiguration": {
                    "LogDriver": "awslogs",
                    "Options": {
                        "awslogs-group": reference(&log_group),
                        "awslogs-stream-prefix": LOG_STREAM_PREFIX,
                        "awslogs-region": pseudo(REGION),
                    },
                },
                "Memory": container.memory_mib,
                "Name": container.name,
                "PortMappings": [{
                    "ContainerPort": container.port,
                    "Protocol": "tcp",
                }],
            }],
            "Cpu": container.cpu.to_string(),
            "ExecutionRoleArn": execution_role.arn(),
            "Family": family,
            "Memory": container.memory_mib.to_string(),
            "NetworkMode": "awsvpc",
            "RequiresCompatibilities": ["FARGATE"],
            "TaskRoleArn": task_role.arn(),
        })),
    )?;

    debug!(
        stack = %stack.name,
        container = %container.name,
        port = container.port,
        "Declared task definition"
    );

    Ok(TaskDefinition {
        id,
        log_group,
        execution_role,
        task_role,
        container_name: container.name.clone(),
        container_port: container.port,
    })
}

/// Everything a service is wired to.
pub struct ServiceProps<'a> {
    pub cluster: &'a LogicalId,
    pub task_definition: &'a TaskDefinition,
    pub vpc: &'a Vpc,
    pub load_balancer: &'a LoadBalancer,
    pub listener: &'a HttpsListener,
    pub desired_count: u32,
}

/// Declare the Fargate service in the private subnets, registered with the
/// listener's target group, and open the container port to the load balancer.
pub fn declare_fargate_service(
    stack: &mut Stack,
    props: &ServiceProps<'_>,
) -> ComposeResult<Service> {
    let port = props.task_definition.container_port;

    let security_group = stack.add(
        "FargateService/SecurityGroup/Resource",
        Resource::new(SECURITY_GROUP_TYPE).with_properties(json!({
            "GroupDescription": format!("{}/FargateService/SecurityGroup", stack.name),
            "SecurityGroupEgress": [{
                "CidrIp": "0.0.0.0/0",
                "Description": "Allow all outbound traffic by default",
                "IpProtocol": "-1",
            }],
            "VpcId": props.vpc.vpc_ref(),
        })),
    )?;

    let lb_group = &props.load_balancer.security_group;

    stack.add(
        &format!("FargateService/SecurityGroup/from{}{}", lb_group, port),
        Resource::new("AWS::EC2::SecurityGroupIngress").with_properties(json!({
            "Description": "Load balancer to target",
            "FromPort": port,
            "GroupId": get_att(&security_group, "GroupId"),
            "IpProtocol": "tcp",
            "SourceSecurityGroupId": get_att(lb_group, "GroupId"),
            "ToPort": port,
        })),
    )?;

    stack.add(
        &format!("lb/SecurityGroup/to{}{}", security_group, port),
        Resource::new("AWS::EC2::SecurityGroupEgress").with_properties(json!({
            "Description": "Load balancer to target",
            "DestinationSecurityGroupId": get_att(&security_group, "GroupId"),
            "FromPort": port,
            "GroupId": get_att(lb_group, "GroupId"),
            "IpProtocol": "tcp",
            "ToPort": port,
        })),
    )?;

    let id = stack.add(
        "FargateService/Service",
        Resource::new(SERVICE_TYPE)
            .with_properties(json!({
                "Cluster": reference(props.cluster),
                "DeploymentConfiguration": {
                    "MaximumPercent": 200,
                    "MinimumHealthyPercent": 50,
                },
                "DesiredCount": props.desired_count,
                "EnableECSManagedTags": false,
                "HealthCheckGracePeriodSeconds": 60,
                "LaunchType": "FARGATE",
                "LoadBalancers": [{
                    "ContainerName": props.task_definition.container_name,
                    "ContainerPort": port,
                    "TargetGroupArn": reference(&props.listener.target_group),
                }],
                "NetworkConfiguration": {
                    "AwsvpcConfiguration": {
                        "AssignPublicIp": "DISABLED",
                        "SecurityGroups": [get_att(&security_group, "GroupId")],
                        "Subnets": props.vpc.private_subnet_refs(),
                    },
                },
                "TaskDefinition": reference(&props.task_definition.id),
            }))
            .depends_on(&props.listener.id)
            .depends_on(&props.task_definition.task_role.id),
    )?;

    Ok(Service { id, security_group })
}
