//! Stack composition for stackgen.
//!
//! Each module declares one slice of a project's deployment unit:
//! - `roles`: execution, pipeline and build IAM roles
//! - `network`: VPC, subnets, routing
//! - `registry`: container image repository
//! - `compute`: ECS cluster, task definition and Fargate service
//! - `edge`: load balancer, HTTPS listener, certificates, DNS records
//! - `buildspec` / `pipeline`: the Source → Build → Deploy pipeline
//! - `project`: wires the slices together for one project
//! - `app`: runs a `StackFactory` over every project in the settings

pub mod app;
pub mod buildspec;
pub mod compute;
pub mod edge;
pub mod error;
pub mod network;
pub mod pipeline;
pub mod project;
pub mod registry;
pub mod roles;

pub use app::{App, ProjectStackFactory, StackFactory, stack_name};
pub use error::{ComposeError, ComposeResult};
pub use project::compose_project;
