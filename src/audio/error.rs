use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the analysis core.
///
/// Every variant is deterministic: retrying the same call with the same
/// input fails the same way, so callers report rather than retry.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("File not found: '{}'", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to decode audio file '{}': {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("Signal too short: need at least {needed} samples, got {got}")]
    InsufficientSignal { needed: usize, got: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AnalysisError::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter(message.into())
    }

    /// Fail unless `len` covers at least one analysis window of `needed` samples.
    pub fn require_len(len: usize, needed: usize) -> Result<()> {
        if len < needed || len == 0 {
            return Err(AnalysisError::InsufficientSignal { needed, got: len });
        }
        Ok(())
    }
}
