//! Error taxonomy for the conversion pipeline.

use thiserror::Error;

use crate::upload::UploadError;

/// Errors surfaced by conversion, execution, and upload steps.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The caller supplied a bad or missing source.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The render executable could not be started.
    #[error("failed to launch render command: {0}")]
    Launch(#[source] std::io::Error),

    /// The render command exited with a non-zero status.
    #[error("render command exited with status {status}: {output}")]
    NonZeroExit { status: i32, output: String },

    /// The caller abandoned the request mid-flight.
    #[error("conversion cancelled")]
    Cancelled,

    /// The backend did not produce a result within its deadline.
    #[error("conversion timed out")]
    Timeout,

    /// Object-storage upload failed after a successful conversion.
    #[error("upload failed: {0}")]
    Upload(#[from] UploadError),

    /// The remote conversion API returned a non-success response.
    #[error("remote backend error: {0}")]
    Backend(String),
}

impl ConvertError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Whether the fallback controller may hand this failure to the
    /// secondary backend. Cancellations, bad input, and upload failures are
    /// always terminal; timeouts retry only when opted in.
    pub fn is_retryable(&self, retry_on_timeout: bool) -> bool {
        match self {
            Self::Backend(_) | Self::Launch(_) | Self::NonZeroExit { .. } => true,
            Self::Timeout => retry_on_timeout,
            Self::InvalidInput(_) | Self::Cancelled | Self::Upload(_) => false,
        }
    }

    /// Label used by the per-category failure counters.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Launch(_) => "launch_error",
            Self::NonZeroExit { .. } => "non_zero_exit",
            Self::Cancelled => "cancelled",
            Self::Timeout => "conversion_timeout",
            Self::Upload(_) => "upload_error",
            Self::Backend(_) => "backend_error",
        }
    }
}
