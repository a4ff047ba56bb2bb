//! Schema descriptors and the artifact factory
//!
//! A [`Descriptor`] is the runtime registration of one [`ArtifactKind`]: its
//! compiled JSON Schema, its default partial value and its version. It builds
//! complete snapshots ([`Descriptor::create`]), validates raw values and
//! re-attaches behavior to envelopes recovered from JSON
//! ([`Descriptor::parse`]).

use crate::data::{ArtifactData, ArtifactEnvelope};
use crate::error::ArtifactError;
use crate::kind::ArtifactKind;
use crate::metadata::{ArtifactId, ArtifactMetadata, ArtifactStatus};
use crate::validation::{SchemaValidator, ValidationError};
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;

/// Runtime registration of one artifact kind
///
/// # Invariants
/// - `validator` is the compiled schema of `K::Data`
/// - Immutable after construction; shared behind `Arc`
pub struct Descriptor<K: ArtifactKind> {
    default_data: K::Patch,
    validator: SchemaValidator,
    _kind: PhantomData<K>,
}

impl<K: ArtifactKind> Descriptor<K> {
    /// Define the descriptor with the kind's own defaults
    ///
    /// # Errors
    /// Returns error if the kind's schema does not compile
    pub fn define() -> Result<Arc<Self>, ValidationError> {
        Self::define_with(K::default_patch())
    }

    /// Define the descriptor with custom defaults
    ///
    /// # Errors
    /// Returns error if the kind's schema does not compile
    pub fn define_with(default_data: K::Patch) -> Result<Arc<Self>, ValidationError> {
        let validator = SchemaValidator::for_type::<K::Data>(K::KIND)?;
        tracing::debug!(kind = K::KIND, version = K::VERSION, "descriptor defined");
        Ok(Arc::new(Self {
            default_data,
            validator,
            _kind: PhantomData,
        }))
    }

    /// Kind name
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        K::KIND
    }

    /// Schema version
    #[inline]
    #[must_use]
    pub fn version(&self) -> u32 {
        K::VERSION
    }

    /// Default partial value
    #[inline]
    #[must_use]
    pub fn default_data(&self) -> &K::Patch {
        &self.default_data
    }

    /// JSON Schema of the complete value
    #[inline]
    #[must_use]
    pub fn json_schema(&self) -> &Value {
        self.validator.schema()
    }

    /// Fresh metadata for a new instance
    #[must_use]
    pub fn new_metadata(&self, status: ArtifactStatus) -> ArtifactMetadata {
        ArtifactMetadata::new(ArtifactId::generate(), K::KIND, K::VERSION, status)
    }

    /// Build a complete, non-streaming snapshot
    ///
    /// `partial` is merged over the defaults at the top level only: any field
    /// it carries replaces the default wholesale.
    #[must_use]
    pub fn create(self: &Arc<Self>, partial: Option<K::Patch>) -> ArtifactData<K> {
        let mut data = self.default_data.clone();
        if let Some(partial) = partial {
            K::merge(&mut data, partial);
        }
        let metadata = self.new_metadata(ArtifactStatus::Complete);
        ArtifactData::from_parts(Arc::clone(self), metadata, data)
    }

    /// Validate a raw value against schema and invariants
    ///
    /// # Errors
    /// Returns every schema violation, or the first failing invariant group
    pub fn validate(&self, raw: &Value) -> Result<K::Data, ValidationError> {
        self.validator.check(K::KIND, raw)?;
        let data: K::Data = serde_json::from_value(raw.clone())
            .map_err(|e| ValidationError::single(K::KIND, "", e.to_string()))?;
        K::check_invariants(&data)?;
        Ok(data)
    }

    /// Validate an accumulated partial value
    ///
    /// # Errors
    /// Returns error if the partial is not yet a complete, valid value
    pub fn validate_patch(&self, patch: &K::Patch) -> Result<K::Data, ValidationError> {
        let raw = serde_json::to_value(patch)
            .map_err(|e| ValidationError::single(K::KIND, "", e.to_string()))?;
        self.validate(&raw)
    }

    /// Deserialize an envelope and re-attach behavior
    ///
    /// # Errors
    /// Returns error on malformed JSON, a foreign kind or a version mismatch
    pub fn parse(self: &Arc<Self>, json: &str) -> Result<ArtifactData<K>, ArtifactError> {
        let envelope: ArtifactEnvelope<K::Patch> = serde_json::from_str(json)?;
        self.attach(envelope)
    }

    /// Re-attach behavior to plain envelope data
    ///
    /// # Errors
    /// Returns error on a foreign kind or a version mismatch
    pub fn attach(
        self: &Arc<Self>,
        envelope: ArtifactEnvelope<K::Patch>,
    ) -> Result<ArtifactData<K>, ArtifactError> {
        let ArtifactEnvelope { metadata, data } = envelope;
        if metadata.kind != K::KIND {
            return Err(ArtifactError::InvalidType {
                expected: K::KIND.to_string(),
                actual: metadata.kind,
            });
        }
        if metadata.version != K::VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                kind: K::KIND.to_string(),
                expected: K::VERSION,
                found: metadata.version,
            });
        }
        Ok(ArtifactData::from_parts(Arc::clone(self), metadata, data))
    }
}

impl<K: ArtifactKind> Debug for Descriptor<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("kind", &K::KIND)
            .field("version", &K::VERSION)
            .field("default_data", &self.default_data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::{
        ExecutionPlan, ExecutionPlanKind, ExecutionPlanPatch, PlanStep, SummarizationKind,
    };
    use serde_json::json;

    fn plan() -> ExecutionPlan {
        ExecutionPlan {
            objective: "Find the cheapest flight".into(),
            approach: "Search then compare".into(),
            total_steps: 1,
            completed_steps: 0,
            current_step: 0,
            steps: vec![PlanStep::pending(1, "navigate", "open search").with_target("https://x.test")],
            progress: 0.0,
            estimated_time_remaining: Some(5_000),
        }
    }

    #[test]
    fn create_merges_over_defaults() {
        let descriptor = Descriptor::<ExecutionPlanKind>::define().unwrap();
        let artifact = descriptor.create(Some(ExecutionPlanPatch {
            objective: Some("goal".into()),
            ..ExecutionPlanPatch::default()
        }));
        assert_eq!(artifact.metadata().status, ArtifactStatus::Complete);
        assert_eq!(artifact.metadata().kind, "execution_plan");
        assert_eq!(artifact.data().objective.as_deref(), Some("goal"));
        assert_eq!(artifact.data().total_steps, Some(0));
    }

    #[test]
    fn create_without_partial_is_valid_plan() {
        let descriptor = Descriptor::<ExecutionPlanKind>::define().unwrap();
        let artifact = descriptor.create(None);
        assert!(artifact.validate().is_ok());
    }

    #[test]
    fn create_generates_distinct_ids() {
        let descriptor = Descriptor::<ExecutionPlanKind>::define().unwrap();
        let a = descriptor.create(None);
        let b = descriptor.create(None);
        assert_ne!(a.metadata().id, b.metadata().id);
    }

    #[test]
    fn validate_accepts_complete_value() {
        let descriptor = Descriptor::<ExecutionPlanKind>::define().unwrap();
        let raw = serde_json::to_value(plan()).unwrap();
        assert_eq!(descriptor.validate(&raw).unwrap(), plan());
    }

    #[test]
    fn validate_rejects_wrong_shape() {
        let descriptor = Descriptor::<ExecutionPlanKind>::define().unwrap();
        let err = descriptor
            .validate(&json!({ "objective": 3, "steps": "nope" }))
            .unwrap_err();
        assert_eq!(err.kind, "execution_plan");
        assert!(err.touches("/objective"));
        assert!(err.touches("/steps"));
    }

    #[test]
    fn summarization_defaults_are_incomplete() {
        let descriptor = Descriptor::<SummarizationKind>::define().unwrap();
        let err = descriptor.create(None).validate().unwrap_err();
        assert_eq!(err.kind, "summarization");
    }

    #[test]
    fn parse_rejects_foreign_kind() {
        let plans = Descriptor::<ExecutionPlanKind>::define().unwrap();
        let summaries = Descriptor::<SummarizationKind>::define().unwrap();
        let json = summaries.create(None).serialize().unwrap();
        assert!(matches!(
            plans.parse(&json),
            Err(ArtifactError::InvalidType { .. })
        ));
    }

    #[test]
    fn parse_rejects_other_version() {
        let descriptor = Descriptor::<ExecutionPlanKind>::define().unwrap();
        let mut envelope = descriptor.create(None).to_envelope();
        envelope.metadata.version = 99;
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(matches!(
            descriptor.parse(&json),
            Err(ArtifactError::UnsupportedVersion { found: 99, .. })
        ));
    }
}
