use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeekerError {
    #[error("Agent not found: {0}")]
    AgentNotFound(crate::core::types::AgentId),

    #[error("Inference timed out after {0:?}")]
    InferenceTimeout(Duration),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SeekerError>;
