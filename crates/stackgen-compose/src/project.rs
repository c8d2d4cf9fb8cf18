//! One project's deployment unit.

use stackgen_config::ProjectConfig;
use stackgen_core::{Environment, Output, Stack};
use tracing::info;

use crate::ComposeResult;
use crate::compute::{
    ContainerSpec, ServiceProps, declare_cluster, declare_fargate_service, declare_task_definition,
};
use crate::edge::{
    HostedZone, declare_domain_aliases, declare_https_listener, declare_load_balancer,
    declare_root_record,
};
use crate::network::{VpcOptions, declare_vpc};
use crate::pipeline::{PipelineProps, declare_delivery_pipeline, pipeline_name};
use crate::registry::{declare_repository, repository_name};
use crate::roles;

/// Replicas of the service.
pub const DESIRED_COUNT: u32 = 1;

/// Compose the full stack for one project: network, registry, compute, edge
/// and the delivery pipeline.
pub fn compose_project(
    stack_name: &str,
    project: &ProjectConfig,
    environment: &Environment,
) -> ComposeResult<Stack> {
    let mut stack = Stack::new(stack_name, environment.clone()).with_description(format!(
        "{} on ECS Fargate behind {}",
        project.project_name, project.root_domain_name
    ));

    let vpc = declare_vpc(&mut stack, &VpcOptions::default())?;
    let load_balancer = declare_load_balancer(&mut stack, &vpc)?;
    let cluster = declare_cluster(&mut stack)?;

    let repository = declare_repository(&mut stack, &repository_name(stack_name))?;

    let container = ContainerSpec::new(&project.container_name, project.container_port);
    let task_definition = declare_task_definition(&mut stack, &container, roles::execution_role())?;

    let zone = HostedZone::new(&project.root_domain_name, project.hosted_zone_id.clone());
    let listener = declare_https_listener(
        &mut stack,
        &load_balancer,
        &vpc,
        &zone,
        project.container_port,
    )?;

    let service = declare_fargate_service(
        &mut stack,
        &ServiceProps {
            cluster: &cluster,
            task_definition: &task_definition,
            vpc: &vpc,
            load_balancer: &load_balancer,
            listener: &listener,
            desired_count: DESIRED_COUNT,
        },
    )?;

    declare_root_record(&mut stack, &load_balancer, &zone)?;
    let aliases = declare_domain_aliases(
        &mut stack,
        &load_balancer,
        &listener,
        &zone,
        &project.domain_names,
    )?;

    let pipeline = declare_delivery_pipeline(
        &mut stack,
        &PipelineProps {
            project,
            repository: &repository,
            cluster: &cluster,
            service: &service,
            name: pipeline_name(&project.project_name),
        },
    )?;

    stack.output(
        "LoadBalancerDnsName",
        Output::new(load_balancer.dns_name()).with_description("Public DNS name of the load balancer"),
    )?;
    stack.output(
        "RepositoryUri",
        Output::new(repository.uri()).with_description("Image repository the build pushes to"),
    )?;
    stack.output("PipelineName", Output::new(pipeline.name.clone().into()))?;

    info!(
        stack = %stack.name,
        resources = stack.template.resources.len(),
        domains = aliases.len(),
        "Composed project stack"
    );

    Ok(stack)
}
