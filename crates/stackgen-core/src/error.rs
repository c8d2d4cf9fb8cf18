//! Error types for stackgen.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate logical id: {0}")]
    DuplicateLogicalId(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
