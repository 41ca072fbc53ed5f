//! Error types for the work router.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Work error: {0}")]
    Work(#[from] WorkError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Persistence errors for the work item store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Work item {id} not found")]
    NotFound { id: String },

    #[error("Work item {id} changed concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Classification / generation service errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Work orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkError {
    #[error("Work item {id} not found")]
    NotFound { id: String },

    #[error("Workers not available: {}", names.join(", "))]
    WorkersUnavailable { names: Vec<String> },

    #[error("Work item {id} has no primary worker")]
    NoPrimaryWorker { id: String },

    #[error("Work item {id} was cancelled during {phase}")]
    Cancelled { id: String, phase: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by a worker while it advances a work item.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Worker {worker} failed during {phase}: {reason}")]
    PhaseFailed {
        worker: String,
        phase: String,
        reason: String,
    },

    #[error("Worker {worker} stopped unexpectedly: {reason}")]
    Aborted { worker: String, reason: String },
}

/// Coordination notification delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to notify {target}: {reason}")]
    Delivery { target: String, reason: String },
}

/// Result type alias for the router.
pub type Result<T> = std::result::Result<T, Error>;
