//! Error handling for the batching pipeline
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline primitives
///
/// Variants carry a `String` payload and the enum is `Clone` so a failure
/// recorded by the consumer loop can later be handed to whoever awaits
/// completion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A dequeue caller's cancellation token fired while it was suspended
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Usage error: an item was submitted after the completion signal fired
    #[error("Task already completed: {0}")]
    Completed(String),

    /// A batch handler invocation returned an error
    #[error("Handler error: {0}")]
    Handler(String),

    /// The consumer loop terminated without reaching completion
    #[error("Worker error: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Whether this error was caused by caller-side cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled(_))
    }

    /// Create a handler error from any displayable cause
    pub fn handler(cause: impl std::fmt::Display) -> Self {
        PipelineError::Handler(cause.to_string())
    }
}
