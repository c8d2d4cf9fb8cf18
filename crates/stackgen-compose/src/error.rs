//! Composition errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("template error: {0}")]
    Template(#[from] stackgen_core::Error),

    #[error("invalid project: {0}")]
    InvalidProject(#[from] stackgen_config::ConfigError),

    #[error("invalid network: {0}")]
    InvalidNetwork(String),
}

pub type ComposeResult<T> = std::result::Result<T, ComposeError>;
