//! Entry composition: one stack per project in the settings.

use stackgen_config::{ProjectConfig, Settings, validate_settings};
use stackgen_core::{CloudAssembly, Environment, Stack};
use tracing::info;

use crate::ComposeResult;
use crate::project::compose_project;

/// Prefix of every project stack name.
pub const STACK_PREFIX: &str = "Project";

/// Name of the stack holding `project`.
pub fn stack_name(project: &ProjectConfig) -> String {
    format!("{}-{}", STACK_PREFIX, project.project_name)
}

/// Builds the stack for one project.
pub trait StackFactory: Send + Sync {
    fn build(
        &self,
        stack_name: &str,
        project: &ProjectConfig,
        environment: &Environment,
    ) -> ComposeResult<Stack>;
}

/// The default composition: network, registry, compute, edge and pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectStackFactory;

impl StackFactory for ProjectStackFactory {
    fn build(
        &self,
        stack_name: &str,
        project: &ProjectConfig,
        environment: &Environment,
    ) -> ComposeResult<Stack> {
        compose_project(stack_name, project, environment)
    }
}

pub struct App {
    factory: Box<dyn StackFactory>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self::with_factory(ProjectStackFactory)
    }

    pub fn with_factory(factory: impl StackFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
        }
    }

    /// Validate `settings` and synthesize one stack per project, in document order.
    pub fn synth(&self, settings: &Settings) -> ComposeResult<CloudAssembly> {
        validate_settings(settings)?;

        let environment = Environment::new(&settings.aws_account_id, &settings.region);
        let mut assembly = CloudAssembly::new();

        for project in &settings.projects {
            let name = stack_name(project);
            let stack = self.factory.build(&name, project, &environment)?;
            info!(
                stack = %stack.name,
                environment = %stack.environment,
                resources = stack.template.resources.len(),
                "Synthesized stack"
            );
            assembly.push(stack)?;
        }

        info!(stacks = assembly.stacks.len(), "Synthesis complete");
        Ok(assembly)
    }
}
