use thiserror::Error;

/// Errors raised while building core domain values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid worker id: {0}")]
    InvalidWorkerId(String),

    #[error("Queue list is empty")]
    NoQueues,
}
