//! Error types.
//!
//! - `PipelineError` is the typed taxonomy every stage returns.
//! - `AppError` is what the binary reports: a message plus a process exit code.

use thiserror::Error;

/// Failure raised by one of the pipeline stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The source does not know the series identifier.
    #[error("Series '{id}' was not found at the source.")]
    NotFound { id: String },

    /// The source could not be reached or answered with a retryable failure.
    #[error("Transient failure fetching '{id}': {message}")]
    Transient { id: String, message: String },

    /// Bad configuration or input data (reported before any computation).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A report section references a frame column or metric that was not computed.
    #[error("Render failed: '{reference}' is not present in the snapshot.")]
    Render { reference: String },

    /// Local filesystem failure (cache, exports, output document).
    #[error("{context}: {message}")]
    Io { context: String, message: String },
}

impl PipelineError {
    pub fn validation(message: impl Into<String>) -> Self {
        PipelineError::Validation(message.into())
    }

    pub fn io(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        PipelineError::Io {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// Only transient failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Transient { .. })
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Validation(_) => 2,
            PipelineError::NotFound { .. } => 3,
            PipelineError::Transient { .. } => 4,
            PipelineError::Render { .. } => 5,
            PipelineError::Io { .. } => 6,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
