//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Sink creation error
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// A worker task panicked or was aborted
    #[error("worker {worker_id} terminated abnormally: {message}")]
    WorkerFailed { worker_id: usize, message: String },

    /// The flush scheduler task panicked or was aborted
    #[error("scheduler terminated abnormally: {message}")]
    SchedulerFailed { message: String },

    /// Invalid enrichment table entry
    #[error("invalid asset entry '{key}': {message}")]
    InvalidAsset { key: String, message: String },
}

impl DispatcherError {
    /// Create a sink creation error
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn scheduler_failed(message: impl ToString) -> Self {
        Self::SchedulerFailed {
            message: message.to_string(),
        }
    }
}
