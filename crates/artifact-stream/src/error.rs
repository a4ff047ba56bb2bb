//! Error types for streaming sessions and writers

use artifact_core::{ArtifactError, ArtifactId, ArtifactStatus, IllegalTransition, ValidationError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Why a session ended in `error`
///
/// Serialized with a `cause` tag, e.g.
/// `{"cause": "timeout", "afterMs": 30000}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "cause", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum FailureCause {
    /// The accumulated value does not match the kind's schema
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// The producer reported a domain failure
    #[error("{message}")]
    ProducerFailure { message: String },

    /// An external abort stopped the producer
    #[error("cancelled: {reason}")]
    Cancelled { reason: String },

    /// The producer exceeded its deadline
    #[error("timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl FailureCause {
    /// Producer failure with a free-text message
    #[inline]
    #[must_use]
    pub fn producer(message: impl Into<String>) -> Self {
        Self::ProducerFailure {
            message: message.into(),
        }
    }

    /// Cancellation with a reason
    #[inline]
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Timeout after `after`
    #[inline]
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            after_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Schema mismatch from a validation error
    #[inline]
    #[must_use]
    pub fn schema_mismatch(error: &ValidationError) -> Self {
        Self::SchemaMismatch {
            message: error.to_string(),
        }
    }

    /// Whether the failure came from outside the producer
    #[inline]
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Cancelled { .. } | Self::Timeout { .. })
    }
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session already reached a terminal state
    #[error("artifact {id} is already {status}")]
    Terminated {
        id: ArtifactId,
        status: ArtifactStatus,
    },

    /// The delta could not be encoded for the writer
    #[error("delta encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The accumulated value failed validation at completion
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Status change outside the lifecycle graph
    #[error(transparent)]
    Transition(#[from] IllegalTransition),

    /// Snapshot construction failed
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl SessionError {
    /// Whether the call was rejected by the post-terminal guard
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated { .. })
    }
}

/// Writer errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriterError {
    /// Background writer task is gone
    #[error("writer channel closed")]
    ChannelClosed,

    /// The sink refused the operation
    #[error("write rejected: {0}")]
    Rejected(String),
}
