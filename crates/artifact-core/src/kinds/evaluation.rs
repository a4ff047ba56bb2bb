//! Evaluation Artifact Kind
//!
//! The evaluator's verdict on an execution: quality scores, issues found and
//! whether the agent should proceed or retry.

use crate::kind::{check_unit_interval, private, replace_if_present, ArtifactKind};
use crate::metadata::now_ms;
use crate::validation::ValidationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Evaluation kind marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationKind;

impl private::Sealed for EvaluationKind {}

impl ArtifactKind for EvaluationKind {
    type Data = Evaluation;
    type Patch = EvaluationPatch;

    const KIND: &'static str = "evaluation";
    const VERSION: u32 = 1;

    fn default_patch() -> Self::Patch {
        EvaluationPatch {
            issues: Some(Vec::new()),
            strengths: Some(Vec::new()),
            should_proceed: Some(false),
            timestamp: Some(now_ms()),
            ..EvaluationPatch::default()
        }
    }

    fn merge(current: &mut Self::Patch, delta: Self::Patch) {
        current.merge(delta);
    }

    fn check_invariants(eval: &Self::Data) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        for (path, value) in [
            ("/score", eval.score),
            ("/completeness", eval.completeness),
            ("/correctness", eval.correctness),
        ] {
            if let Err(e) = check_unit_interval(Self::KIND, path, value) {
                violations.extend(e.violations);
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(Self::KIND, violations))
        }
    }
}

/// Coarse quality rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Complete evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub quality: Quality,
    /// Overall score in `[0, 1]`
    pub score: f64,
    /// Share of the objective achieved, `[0, 1]`
    pub completeness: f64,
    /// Share of actions that were right, `[0, 1]`
    pub correctness: f64,
    pub issues: Vec<String>,
    pub strengths: Vec<String>,
    pub should_proceed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_strategy: Option<String>,
    pub timestamp: i64,
}

/// Partial evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct EvaluationPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correctness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strengths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_proceed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_strategy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl EvaluationPatch {
    /// Top-level merge; issue and strength lists are replaced wholesale
    pub fn merge(&mut self, delta: Self) {
        replace_if_present(&mut self.quality, delta.quality);
        replace_if_present(&mut self.score, delta.score);
        replace_if_present(&mut self.completeness, delta.completeness);
        replace_if_present(&mut self.correctness, delta.correctness);
        replace_if_present(&mut self.issues, delta.issues);
        replace_if_present(&mut self.strengths, delta.strengths);
        replace_if_present(&mut self.should_proceed, delta.should_proceed);
        replace_if_present(&mut self.retry_strategy, delta.retry_strategy);
        replace_if_present(&mut self.timestamp, delta.timestamp);
    }
}

impl From<Evaluation> for EvaluationPatch {
    fn from(eval: Evaluation) -> Self {
        Self {
            quality: Some(eval.quality),
            score: Some(eval.score),
            completeness: Some(eval.completeness),
            correctness: Some(eval.correctness),
            issues: Some(eval.issues),
            strengths: Some(eval.strengths),
            should_proceed: Some(eval.should_proceed),
            retry_strategy: eval.retry_strategy,
            timestamp: Some(eval.timestamp),
        }
    }
}
