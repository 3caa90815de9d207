use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while building or running the admission gate
#[derive(Error, Debug)]
pub enum TollgateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Bucket capacity must be greater than zero")]
    InvalidCapacity,

    #[error("Refill interval must be greater than zero (got {0:?})")]
    InvalidRefillInterval(Duration),

    #[error("Idle-sweep interval must be greater than zero and at most one year (got {0:?})")]
    InvalidSweepInterval(Duration),

    #[error("Idle threshold must be greater than zero and at most one year (got {0:?})")]
    InvalidIdleThreshold(Duration),

    #[error("Unknown rate limit policy: {0}")]
    UnknownPolicy(String),
}

pub type Result<T> = std::result::Result<T, TollgateError>;
