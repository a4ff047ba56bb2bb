//! Summarization Artifact Kind

use crate::kind::{check_unit_interval, private, replace_if_present, ArtifactKind};
use crate::metadata::now_ms;
use crate::validation::ValidationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Summarization kind marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummarizationKind;

impl private::Sealed for SummarizationKind {}

impl ArtifactKind for SummarizationKind {
    type Data = Summarization;
    type Patch = SummarizationPatch;

    const KIND: &'static str = "summarization";
    const VERSION: u32 = 1;

    fn default_patch() -> Self::Patch {
        SummarizationPatch {
            summary: Some(String::new()),
            key_actions: Some(Vec::new()),
            confidence: Some(0.0),
            timestamp: Some(now_ms()),
            ..SummarizationPatch::default()
        }
    }

    fn merge(current: &mut Self::Patch, delta: Self::Patch) {
        current.merge(delta);
    }

    fn check_invariants(data: &Self::Data) -> Result<(), ValidationError> {
        check_unit_interval(Self::KIND, "/confidence", data.confidence)
    }
}

/// How the task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Partial,
    Failure,
}

/// Complete summarization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Summarization {
    pub summary: String,
    pub key_actions: Vec<String>,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
    /// `[0, 1]`
    pub confidence: f64,
    pub timestamp: i64,
}

/// Partial summarization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct SummarizationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_actions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl SummarizationPatch {
    /// Top-level merge
    pub fn merge(&mut self, delta: Self) {
        replace_if_present(&mut self.summary, delta.summary);
        replace_if_present(&mut self.key_actions, delta.key_actions);
        replace_if_present(&mut self.outcome, delta.outcome);
        replace_if_present(&mut self.next_steps, delta.next_steps);
        replace_if_present(&mut self.confidence, delta.confidence);
        replace_if_present(&mut self.timestamp, delta.timestamp);
    }
}

impl From<Summarization> for SummarizationPatch {
    fn from(data: Summarization) -> Self {
        Self {
            summary: Some(data.summary),
            key_actions: Some(data.key_actions),
            outcome: Some(data.outcome),
            next_steps: data.next_steps,
            confidence: Some(data.confidence),
            timestamp: Some(data.timestamp),
        }
    }
}
