use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy for the inference core. Every variant is terminal for the
/// current request; nothing is retried below the orchestrator.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("audio is {seconds:.3}s, below the {min_seconds}s minimum")]
    EmptyOrTooShortInput { seconds: f32, min_seconds: f32 },
    #[error("feature extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("model artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),
    #[error("model artifact corrupt: {0}")]
    ArtifactCorrupt(String),
    #[error("feature shape mismatch: got {got:?}, expected {expected:?}")]
    ShapeMismatch {
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    #[error("scoring failed: {0}")]
    ScoringFailed(String),
}

impl DetectError {
    pub fn extraction<T: Into<String>>(message: T) -> Self {
        Self::ExtractionFailed(message.into())
    }

    pub fn corrupt<T: Into<String>>(message: T) -> Self {
        Self::ArtifactCorrupt(message.into())
    }

    pub fn scoring<T: Into<String>>(message: T) -> Self {
        Self::ScoringFailed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_failure_kind() {
        let err = DetectError::UnsupportedFormat("ogg".into());
        assert!(err.to_string().contains("ogg"));

        let err = DetectError::ShapeMismatch {
            got: vec![128, 128, 3],
            expected: vec![1, 128, 128, 3],
        };
        assert!(err.to_string().contains("[1, 128, 128, 3]"));
    }
}
