//! Error types for artifact construction, parsing and serialization

use crate::validation::ValidationError;

/// Errors related to artifact envelopes
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// JSON encoding or decoding failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Envelope carries a different kind
    #[error("invalid artifact type: expected {expected}, got {actual}")]
    InvalidType { expected: String, actual: String },

    /// Envelope carries an unsupported schema version
    #[error("unsupported {kind} version: expected {expected}, got {found}")]
    UnsupportedVersion {
        kind: String,
        expected: u32,
        found: u32,
    },

    /// Schema or invariant violation
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ArtifactError {
    /// Whether the error is a shape problem rather than an envelope problem
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_type_display() {
        let err = ArtifactError::InvalidType {
            expected: "evaluation".into(),
            actual: "summarization".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid artifact type: expected evaluation, got summarization"
        );
        assert!(!err.is_validation());
    }
}
