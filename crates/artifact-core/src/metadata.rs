//! Artifact identity, lifecycle status and metadata
//!
//! Every artifact instance carries an [`ArtifactMetadata`] record. The status
//! field follows a three-state lifecycle:
//!
//! ```text
//! streaming ──► complete
//!     │
//!     └──────► error
//! ```
//!
//! Both `complete` and `error` are terminal.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Current wall-clock time in epoch milliseconds
#[inline]
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Unique identifier of one artifact instance
///
/// Generated ids are ULIDs: a millisecond timestamp prefix followed by
/// 80 random bits, so they sort by creation time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Generate a fresh random + time-based id
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    /// Wrap an existing id string
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ArtifactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ArtifactId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lifecycle status of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    /// Producer is still publishing deltas
    #[default]
    Streaming,
    /// Producer finished successfully
    Complete,
    /// Producer failed, was cancelled or timed out
    Error,
}

impl ArtifactStatus {
    /// Whether no further transitions are defined
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Statuses reachable from `self` in one step
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [ArtifactStatus] {
        match self {
            Self::Streaming => &[Self::Complete, Self::Error],
            Self::Complete | Self::Error => &[],
        }
    }

    /// Check a single transition
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] when `next` is not reachable from `self`
    pub fn validate_transition(self, next: ArtifactStatus) -> Result<(), IllegalTransition> {
        if self.allowed_transitions().contains(&next) {
            Ok(())
        } else {
            Err(IllegalTransition { from: self, to: next })
        }
    }

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl Display for ArtifactStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attempted status change outside the lifecycle graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal status transition: {from} -> {to}")]
pub struct IllegalTransition {
    /// Status before the attempt
    pub from: ArtifactStatus,
    /// Requested status
    pub to: ArtifactStatus,
}

/// Metadata envelope of an artifact instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Unique per stream instance
    pub id: ArtifactId,
    /// Kind name (e.g. `execution_plan`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Schema version of the kind
    pub version: u32,
    /// Creation time, epoch milliseconds
    pub created_at: i64,
    /// Last modification time, epoch milliseconds
    pub updated_at: i64,
    /// Lifecycle status
    pub status: ArtifactStatus,
}

impl ArtifactMetadata {
    /// New metadata stamped with the current time
    #[must_use]
    pub fn new(id: ArtifactId, kind: impl Into<String>, version: u32, status: ArtifactStatus) -> Self {
        let now = now_ms();
        Self {
            id,
            kind: kind.into(),
            version,
            created_at: now,
            updated_at: now,
            status,
        }
    }

    /// Placeholder for an id seen before its creation metadata
    #[must_use]
    pub fn placeholder(id: ArtifactId) -> Self {
        Self::new(id, String::new(), 0, ArtifactStatus::Streaming)
    }

    /// Bump `updated_at`, never moving it backwards
    ///
    /// Returns the new value.
    pub fn touch(&mut self) -> i64 {
        self.updated_at = self.updated_at.max(now_ms());
        self.updated_at
    }

    /// Move to `next`, enforcing the lifecycle graph
    ///
    /// # Errors
    /// Returns [`IllegalTransition`] for any transition out of a terminal state
    pub fn transition(&mut self, next: ArtifactStatus) -> Result<(), IllegalTransition> {
        self.status.validate_transition(next)?;
        self.status = next;
        self.touch();
        Ok(())
    }
}

/// Partial metadata update sent to writers
///
/// Absent fields leave the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetadataPatch {
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ArtifactStatus>,
}

impl MetadataPatch {
    /// Patch that only advances `updated_at`
    #[inline]
    #[must_use]
    pub fn touched(updated_at: i64) -> Self {
        Self {
            updated_at: Some(updated_at),
            ..Self::default()
        }
    }

    /// Add a status change
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: ArtifactStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether the patch carries no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into stored metadata
    ///
    /// `updated_at` only moves forward.
    pub fn apply_to(&self, metadata: &mut ArtifactMetadata) {
        if let Some(kind) = &self.kind {
            metadata.kind.clone_from(kind);
        }
        if let Some(version) = self.version {
            metadata.version = version;
        }
        if let Some(created_at) = self.created_at {
            metadata.created_at = created_at;
        }
        if let Some(updated_at) = self.updated_at {
            metadata.updated_at = metadata.updated_at.max(updated_at);
        }
        if let Some(status) = self.status {
            metadata.status = status;
        }
    }
}

impl From<&ArtifactMetadata> for MetadataPatch {
    fn from(metadata: &ArtifactMetadata) -> Self {
        Self {
            kind: Some(metadata.kind.clone()),
            version: Some(metadata.version),
            created_at: Some(metadata.created_at),
            updated_at: Some(metadata.updated_at),
            status: Some(metadata.status),
        }
    }
}
