//! Artifact kind registry
//!
//! Provides [`ArtifactRegistry`] for looking up descriptors by type and
//! for decoding envelopes whose kind is only known at runtime.

use crate::data::ArtifactData;
use crate::descriptor::Descriptor;
use crate::error::ArtifactError;
use crate::kind::ArtifactKind;
use crate::kinds::{
    EvaluationKind, ExecutionPlanKind, PageContextKind, SummarizationKind, ToolResultsKind,
};
use crate::metadata::ArtifactMetadata;
use crate::validation::ValidationError;
use serde::Deserialize;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No descriptor for this kind name
    #[error("unknown artifact kind: {0}")]
    UnknownKind(String),

    /// Kind registered twice
    #[error("artifact kind already registered: {0}")]
    DuplicateKind(String),

    /// Envelope did not carry a readable `metadata.type`
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] serde_json::Error),

    /// Descriptor could not be defined
    #[error("descriptor definition failed: {0}")]
    Definition(#[from] ValidationError),

    /// Parsing with the resolved descriptor failed
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Summary of one registered kind
#[derive(Debug, Clone)]
pub struct KindInfo {
    pub kind: &'static str,
    pub version: u32,
    pub schema: Value,
}

/// Artifact of a kind resolved at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum AnyArtifact {
    ExecutionPlan(ArtifactData<ExecutionPlanKind>),
    ToolResults(ArtifactData<ToolResultsKind>),
    PageContext(ArtifactData<PageContextKind>),
    Evaluation(ArtifactData<EvaluationKind>),
    Summarization(ArtifactData<SummarizationKind>),
}

impl AnyArtifact {
    /// Metadata of the wrapped artifact
    #[must_use]
    pub fn metadata(&self) -> &ArtifactMetadata {
        match self {
            Self::ExecutionPlan(a) => a.metadata(),
            Self::ToolResults(a) => a.metadata(),
            Self::PageContext(a) => a.metadata(),
            Self::Evaluation(a) => a.metadata(),
            Self::Summarization(a) => a.metadata(),
        }
    }

    /// Kind name
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.metadata().kind
    }

    /// Encode as the JSON envelope
    ///
    /// # Errors
    /// Returns error if the data cannot be encoded
    pub fn serialize(&self) -> Result<String, ArtifactError> {
        match self {
            Self::ExecutionPlan(a) => a.serialize(),
            Self::ToolResults(a) => a.serialize(),
            Self::PageContext(a) => a.serialize(),
            Self::Evaluation(a) => a.serialize(),
            Self::Summarization(a) => a.serialize(),
        }
    }
}

#[derive(Deserialize)]
struct KindProbe {
    metadata: KindProbeMetadata,
}

#[derive(Deserialize)]
struct KindProbeMetadata {
    #[serde(rename = "type")]
    kind: String,
}

/// Registry of artifact descriptors keyed by kind name
#[derive(Debug, Default, Clone)]
pub struct ArtifactRegistry {
    descriptors: HashMap<&'static str, Arc<dyn Any + Send + Sync>>,
    infos: BTreeMap<&'static str, KindInfo>,
}

impl ArtifactRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create registry with the five built-in kinds
    ///
    /// # Errors
    /// Returns error if a built-in schema fails to compile
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(Descriptor::<ExecutionPlanKind>::define()?)?;
        registry.register(Descriptor::<ToolResultsKind>::define()?)?;
        registry.register(Descriptor::<PageContextKind>::define()?)?;
        registry.register(Descriptor::<EvaluationKind>::define()?)?;
        registry.register(Descriptor::<SummarizationKind>::define()?)?;
        Ok(registry)
    }

    /// Register a descriptor
    ///
    /// # Errors
    /// Returns error if the kind is already registered
    pub fn register<K: ArtifactKind>(
        &mut self,
        descriptor: Arc<Descriptor<K>>,
    ) -> Result<(), RegistryError> {
        if self.descriptors.contains_key(K::KIND) {
            return Err(RegistryError::DuplicateKind(K::KIND.to_string()));
        }
        self.infos.insert(
            K::KIND,
            KindInfo {
                kind: K::KIND,
                version: K::VERSION,
                schema: descriptor.json_schema().clone(),
            },
        );
        self.descriptors.insert(K::KIND, descriptor);
        Ok(())
    }

    /// Typed descriptor lookup
    #[must_use]
    pub fn descriptor<K: ArtifactKind>(&self) -> Option<Arc<Descriptor<K>>> {
        self.descriptors
            .get(K::KIND)
            .and_then(|any| Arc::clone(any).downcast::<Descriptor<K>>().ok())
    }

    /// Check if kind is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.descriptors.contains_key(kind)
    }

    /// Info for one kind
    #[inline]
    #[must_use]
    pub fn info(&self, kind: &str) -> Option<&KindInfo> {
        self.infos.get(kind)
    }

    /// Registered kinds, sorted by name
    pub fn kinds(&self) -> impl Iterator<Item = &KindInfo> {
        self.infos.values()
    }

    /// Number of registered kinds
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Decode an envelope, dispatching on `metadata.type`
    ///
    /// # Errors
    /// Returns error for unknown kinds, malformed envelopes or parse failures
    pub fn parse_any(&self, json: &str) -> Result<AnyArtifact, RegistryError> {
        let probe: KindProbe = serde_json::from_str(json)?;
        let kind = probe.metadata.kind.as_str();

        if kind == ExecutionPlanKind::KIND {
            Ok(AnyArtifact::ExecutionPlan(self.parse_as(json)?))
        } else if kind == ToolResultsKind::KIND {
            Ok(AnyArtifact::ToolResults(self.parse_as(json)?))
        } else if kind == PageContextKind::KIND {
            Ok(AnyArtifact::PageContext(self.parse_as(json)?))
        } else if kind == EvaluationKind::KIND {
            Ok(AnyArtifact::Evaluation(self.parse_as(json)?))
        } else if kind == SummarizationKind::KIND {
            Ok(AnyArtifact::Summarization(self.parse_as(json)?))
        } else {
            Err(RegistryError::UnknownKind(probe.metadata.kind))
        }
    }

    fn parse_as<K: ArtifactKind>(&self, json: &str) -> Result<ArtifactData<K>, RegistryError> {
        let descriptor = self
            .descriptor::<K>()
            .ok_or_else(|| RegistryError::UnknownKind(K::KIND.to_string()))?;
        Ok(descriptor.parse(json)?)
    }
}
