//! Stacks: a named template bound to a deployment environment.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{LogicalId, Output, Resource, Result, Template};

/// Target account and region of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("aws://{account}/{region}")]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

/// One deployment unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    pub name: String,
    pub environment: Environment,
    pub template: Template,
}

impl Stack {
    pub fn new(name: impl Into<String>, environment: Environment) -> Self {
        Self {
            name: name.into(),
            environment,
            template: Template::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.template.description = Some(description.into());
        self
    }

    /// Declare a resource at a construct path and return its logical id.
    pub fn add(&mut self, path: &str, resource: Resource) -> Result<LogicalId> {
        let id = LogicalId::from_path(path);
        debug!(stack = %self.name, %path, logical_id = %id, resource_type = %resource.resource_type, "Declaring resource");
        self.template.add_resource(id.clone(), resource)?;
        Ok(id)
    }

    pub fn output(&mut self, name: &str, output: Output) -> Result<()> {
        self.template.add_output(name, output)
    }

    /// File name of this stack's template inside a cloud assembly.
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }
}
