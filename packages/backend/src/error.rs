use queue_core::CoreError;
use thiserror::Error;

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid backend config: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}
