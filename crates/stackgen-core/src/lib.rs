//! CloudFormation template model for stackgen.
//!
//! This crate contains:
//! - Logical identifiers derived from construct paths
//! - Resources, templates and intrinsic functions
//! - IAM policy documents
//! - Stacks, template diffs and the cloud assembly written to disk

pub mod assembly;
pub mod diff;
pub mod error;
pub mod iam;
pub mod id;
pub mod intrinsic;
pub mod resource;
pub mod stack;
pub mod template;

pub use assembly::CloudAssembly;
pub use error::{Error, Result};
pub use id::LogicalId;
pub use resource::{DeletionPolicy, Resource};
pub use stack::{Environment, Stack};
pub use template::{Output, Template};
