//! Settings document parsing for stackgen.
//!
//! This crate handles:
//! - The settings model (account, region, projects)
//! - Loading settings from JSON (`settings.json`) or KDL (`settings.kdl`)
//! - Validation of the business rules every project must satisfy

pub mod error;
pub mod kdl_format;
pub mod settings;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use settings::{ProjectConfig, Settings, load_settings, parse_json};
pub use validate::{subdomain_label, validate_settings};
