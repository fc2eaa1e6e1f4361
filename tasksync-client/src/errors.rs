use std::time::Duration;
use tasksync_core::{SyncError, TaskId};
use thiserror::Error;

/// Failures talking to the remote task service.
///
/// Every variant is transient from the engine's point of view: it flips the
/// client offline and the mutation falls back to the local cache.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{path} returned status {status}")]
    Status { status: u16, path: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::Status { status: 404, .. })
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Task {0} not found locally")]
    TaskNotFound(TaskId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to acquire lock: {0}")]
    LockError(String),

    #[error("Thread safety violation: process_events() must be called on the registration thread")]
    ThreadSafetyViolation,

    #[error("No callbacks registered yet")]
    NoCallbacksRegistered,
}

pub type ClientResult<T> = Result<T, ClientError>;
