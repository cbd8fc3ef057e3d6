//! Error types for the inference pipeline.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the pipeline.
///
/// `Clone` so that a failed one-time load can be handed to every caller of
/// the artifact cache.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// An artifact file is missing, unreadable, corrupt, or has the wrong
    /// column count.
    #[error("failed to load artifact {}: {reason}", path.display())]
    ArtifactLoad { path: PathBuf, reason: String },

    /// The model's input/output shape disagrees with the fixed window layout.
    #[error("shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    /// Voltage is NaN or infinite.
    #[error("invalid input: voltage must be finite, got {voltage}")]
    InvalidInput { voltage: f64 },

    /// The runtime failed while executing an already loaded model.
    #[error("inference failed: {reason}")]
    Inference { reason: String },
}

impl PipelineError {
    /// Create an artifact load error for `path`.
    #[must_use]
    pub fn artifact_load(path: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::ArtifactLoad {
            path: path.as_ref().to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Create a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(
        what: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Self::ShapeMismatch {
            what: what.into(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }

    /// Create an inference error.
    #[must_use]
    pub fn inference(reason: impl ToString) -> Self {
        Self::Inference {
            reason: reason.to_string(),
        }
    }

    /// True when the error came from loading an artifact.
    pub fn is_artifact_load(&self) -> bool {
        matches!(self, Self::ArtifactLoad { .. })
    }

    /// True when the error is a shape mismatch.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ShapeMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_load_display() {
        let err = PipelineError::artifact_load("scaler_X.json", "file not found");
        assert_eq!(
            err.to_string(),
            "failed to load artifact scaler_X.json: file not found"
        );
        assert!(err.is_artifact_load());
        assert!(!err.is_shape_mismatch());
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = PipelineError::shape_mismatch("model input", [-1, 30, 2], [1, 24, 2]);
        assert_eq!(
            err.to_string(),
            "shape mismatch in model input: expected [-1, 30, 2], got [1, 24, 2]"
        );
        assert!(err.is_shape_mismatch());
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = PipelineError::inference("session poisoned");
        assert_eq!(err.clone(), err);
    }
}
