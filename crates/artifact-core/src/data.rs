//! Artifact data with attached behavior
//!
//! [`ArtifactEnvelope`] is the plain `{metadata, data}` wire shape.
//! [`ArtifactData`] is the same content bound to its [`Descriptor`], which
//! is what gives it `validate`, `merge` and `serialize`. Envelopes become
//! `ArtifactData` only through [`Descriptor::attach`] or
//! [`Descriptor::parse`].

use crate::descriptor::Descriptor;
use crate::error::ArtifactError;
use crate::fingerprint::Fingerprint;
use crate::kind::ArtifactKind;
use crate::metadata::ArtifactMetadata;
use crate::validation::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Serialized artifact envelope
///
/// Wire format: `{"metadata": {...}, "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope<P> {
    pub metadata: ArtifactMetadata,
    pub data: P,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, P> {
    metadata: &'a ArtifactMetadata,
    data: &'a P,
}

/// Artifact content bound to its descriptor
///
/// # Invariants
/// - `metadata.kind == K::KIND`
/// - Values are never mutated in place; [`ArtifactData::merge`] returns a copy
pub struct ArtifactData<K: ArtifactKind> {
    descriptor: Arc<Descriptor<K>>,
    metadata: ArtifactMetadata,
    data: K::Patch,
}

impl<K: ArtifactKind> ArtifactData<K> {
    pub(crate) fn from_parts(
        descriptor: Arc<Descriptor<K>>,
        metadata: ArtifactMetadata,
        data: K::Patch,
    ) -> Self {
        Self {
            descriptor,
            metadata,
            data,
        }
    }

    /// Metadata
    #[inline]
    #[must_use]
    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    /// Partial data
    #[inline]
    #[must_use]
    pub fn data(&self) -> &K::Patch {
        &self.data
    }

    /// Owning descriptor
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<Descriptor<K>> {
        &self.descriptor
    }

    /// Validate the accumulated data as a complete value
    ///
    /// Failures are logged here; callers receive the structured error and
    /// should read it as "shape invalid", never as "artifact absent".
    ///
    /// # Errors
    /// Returns error if the data is incomplete or violates the schema
    pub fn validate(&self) -> Result<K::Data, ValidationError> {
        self.descriptor.validate_patch(&self.data).map_err(|e| {
            tracing::warn!(
                artifact_id = %self.metadata.id,
                kind = K::KIND,
                violations = e.violations.len(),
                "artifact validation failed: {e}"
            );
            e
        })
    }

    /// Merge `update` into a copy of this artifact
    ///
    /// `self` is left untouched; the copy's `updated_at` is advanced.
    #[must_use]
    pub fn merge(&self, update: K::Patch) -> Self {
        let mut next = self.clone();
        K::merge(&mut next.data, update);
        next.metadata.touch();
        next
    }

    /// Encode as the JSON envelope
    ///
    /// # Errors
    /// Returns error if the data cannot be encoded
    pub fn serialize(&self) -> Result<String, ArtifactError> {
        Ok(serde_json::to_string(&self.as_envelope_ref())?)
    }

    /// Encode as a JSON value
    ///
    /// # Errors
    /// Returns error if the data cannot be encoded
    pub fn to_json_value(&self) -> Result<serde_json::Value, ArtifactError> {
        Ok(serde_json::to_value(self.as_envelope_ref())?)
    }

    /// Plain envelope copy (drops behavior)
    #[must_use]
    pub fn to_envelope(&self) -> ArtifactEnvelope<K::Patch> {
        ArtifactEnvelope {
            metadata: self.metadata.clone(),
            data: self.data.clone(),
        }
    }

    /// Digest of the serialized data (metadata excluded)
    ///
    /// # Errors
    /// Returns error if the data cannot be encoded
    pub fn fingerprint(&self) -> Result<Fingerprint, ArtifactError> {
        Ok(Fingerprint::of_json(&self.data)?)
    }

    fn as_envelope_ref(&self) -> EnvelopeRef<'_, K::Patch> {
        EnvelopeRef {
            metadata: &self.metadata,
            data: &self.data,
        }
    }
}

impl<K: ArtifactKind> Clone for ArtifactData<K> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Arc::clone(&self.descriptor),
            metadata: self.metadata.clone(),
            data: self.data.clone(),
        }
    }
}

impl<K: ArtifactKind> PartialEq for ArtifactData<K> {
    fn eq(&self, other: &Self) -> bool {
        self.metadata == other.metadata && self.data == other.data
    }
}

impl<K: ArtifactKind> Debug for ArtifactData<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactData")
            .field("metadata", &self.metadata)
            .field("data", &self.data)
            .finish()
    }
}
