//! Error types for webposture.
//!
//! Check failures are not errors at this level: they are carried as `Stage::Failed`
//! inside the result bundle. The types here cover faults that escape a stage.

use crate::core::models::JobStatus;
use thiserror::Error;

/// Faults of the scan pipeline itself. Any of these fails the whole attempt.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid target URL '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("job store error: {0}")]
    Store(#[from] StoreError),

    #[error("could not enqueue scan: {0}")]
    Queue(#[from] QueueError),
}

/// Errors raised by a `JobStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job '{0}' not found")]
    NotFound(String),

    #[error("job '{job_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("job store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task queue is closed")]
    Closed,
}
