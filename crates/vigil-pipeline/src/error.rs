//! Error types for pipeline operations.

use std::time::Duration;

use thiserror::Error;
use vigil_models::config::ConfigError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while running the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("pipeline stage '{stage}' exited unexpectedly: {message}")]
    StageFailed { stage: &'static str, message: String },

    #[error("stages did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Create a stage failure error.
    pub fn stage_failed(stage: &'static str, message: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            message: message.into(),
        }
    }
}
