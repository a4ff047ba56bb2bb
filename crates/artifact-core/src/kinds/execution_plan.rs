//! Execution Plan Artifact Kind
//!
//! A step-by-step plan produced by the planner and progressively annotated
//! by the executor. Steps follow their own lifecycle, and a pending step
//! may also finish directly:
//!
//! ```text
//! pending ──► in_progress ──► completed
//!                   │
//!                   └───────► failed
//! ```

use crate::kind::{check_unit_interval, private, replace_if_present, ArtifactKind};
use crate::validation::{ValidationError, Violation};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Upper bound on the number of steps in one plan
pub const MAX_PLAN_STEPS: usize = 50;

/// Execution plan kind marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionPlanKind;

impl private::Sealed for ExecutionPlanKind {}

impl ArtifactKind for ExecutionPlanKind {
    type Data = ExecutionPlan;
    type Patch = ExecutionPlanPatch;

    const KIND: &'static str = "execution_plan";
    const VERSION: u32 = 1;

    fn default_patch() -> Self::Patch {
        ExecutionPlanPatch {
            objective: Some(String::new()),
            approach: Some(String::new()),
            total_steps: Some(0),
            completed_steps: Some(0),
            current_step: Some(0),
            steps: Some(Vec::new()),
            progress: Some(0.0),
            estimated_time_remaining: None,
        }
    }

    fn merge(current: &mut Self::Patch, delta: Self::Patch) {
        current.merge(delta);
    }

    fn check_invariants(plan: &Self::Data) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        if plan.completed_steps > plan.total_steps {
            violations.push(Violation::new(
                "/completedSteps",
                format!(
                    "completed steps {} exceed total steps {}",
                    plan.completed_steps, plan.total_steps
                ),
            ));
        }
        if plan.steps.len() > MAX_PLAN_STEPS {
            violations.push(Violation::new(
                "/steps",
                format!("{} steps exceed the limit of {MAX_PLAN_STEPS}", plan.steps.len()),
            ));
        }
        if let Err(e) = check_unit_interval(Self::KIND, "/progress", plan.progress) {
            violations.extend(e.violations);
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(Self::KIND, violations))
        }
    }
}

/// Complete execution plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    /// What the plan is trying to achieve
    pub objective: String,
    /// High-level strategy
    pub approach: String,
    /// Number of planned steps
    pub total_steps: u32,
    /// Steps in `completed` status
    pub completed_steps: u32,
    /// Index of the most recently updated step
    pub current_step: u32,
    /// Ordered steps
    pub steps: Vec<PlanStep>,
    /// `completed_steps / total_steps`
    pub progress: f64,
    /// Remaining time estimate in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<u64>,
}

/// One plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// 1-based step number as shown to users
    pub step: u32,
    /// Action to perform (e.g. `click`, `navigate`)
    pub action: String,
    /// Element or URL the action targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Step lifecycle status
    pub status: StepStatus,
    /// Why this step exists
    pub reasoning: String,
    /// Outcome text once the step ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl PlanStep {
    /// New pending step
    #[must_use]
    pub fn pending(step: u32, action: impl Into<String>, reasoning: impl Into<String>) -> Self {
        Self {
            step,
            action: action.into(),
            target: None,
            status: StepStatus::Pending,
            reasoning: reasoning.into(),
            result: None,
        }
    }

    /// With target
    #[inline]
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Per-step lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started
    #[default]
    Pending,
    /// Running
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished unsuccessfully
    Failed,
}

impl StepStatus {
    /// Whether the step can no longer change
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses reachable from `self`
    ///
    /// A step may finish straight from `pending`. A running step may be
    /// re-reported as running (to attach interim results); nothing ever
    /// returns to `pending`.
    #[must_use]
    pub fn allowed_transitions(self) -> &'static [StepStatus] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Completed, Self::Failed],
            Self::InProgress => &[Self::InProgress, Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    /// Check a single step transition
    ///
    /// # Errors
    /// Returns [`StepTransitionError`] when `next` is not reachable
    pub fn validate_transition(self, next: StepStatus) -> Result<(), StepTransitionError> {
        if self.allowed_transitions().contains(&next) {
            Ok(())
        } else {
            Err(StepTransitionError { from: self, to: next })
        }
    }
}

impl Display for StepStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Illegal step status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal step transition: {from} -> {to}")]
pub struct StepTransitionError {
    /// Status before the attempt
    pub from: StepStatus,
    /// Requested status
    pub to: StepStatus,
}

/// Partial execution plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct ExecutionPlanPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approach: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<PlanStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time_remaining: Option<u64>,
}

impl ExecutionPlanPatch {
    /// Top-level merge; `steps` is replaced wholesale
    pub fn merge(&mut self, delta: Self) {
        replace_if_present(&mut self.objective, delta.objective);
        replace_if_present(&mut self.approach, delta.approach);
        replace_if_present(&mut self.total_steps, delta.total_steps);
        replace_if_present(&mut self.completed_steps, delta.completed_steps);
        replace_if_present(&mut self.current_step, delta.current_step);
        replace_if_present(&mut self.steps, delta.steps);
        replace_if_present(&mut self.progress, delta.progress);
        replace_if_present(&mut self.estimated_time_remaining, delta.estimated_time_remaining);
    }
}

impl From<ExecutionPlan> for ExecutionPlanPatch {
    fn from(plan: ExecutionPlan) -> Self {
        Self {
            objective: Some(plan.objective),
            approach: Some(plan.approach),
            total_steps: Some(plan.total_steps),
            completed_steps: Some(plan.completed_steps),
            current_step: Some(plan.current_step),
            steps: Some(plan.steps),
            progress: Some(plan.progress),
            estimated_time_remaining: plan.estimated_time_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_lifecycle() {
        use StepStatus::*;
        assert!(Pending.validate_transition(InProgress).is_ok());
        assert!(InProgress.validate_transition(Completed).is_ok());
        assert!(InProgress.validate_transition(Failed).is_ok());
        assert!(InProgress.validate_transition(InProgress).is_ok());
        assert!(Pending.validate_transition(Completed).is_ok());
        assert!(Pending.validate_transition(Failed).is_ok());

        assert!(Pending.validate_transition(Pending).is_err());
        assert!(InProgress.validate_transition(Pending).is_err());
        assert!(Completed.validate_transition(Failed).is_err());
        assert!(Failed.validate_transition(InProgress).is_err());
    }

    #[test]
    fn step_status_wire_names() {
        let json = serde_json::to_string(&StepStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        assert_eq!(StepStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn merge_replaces_steps_wholesale() {
        let mut current = ExecutionPlanKind::default_patch();
        current.steps = Some(vec![
            PlanStep::pending(1, "navigate", "open page"),
            PlanStep::pending(2, "click", "submit"),
        ]);
        ExecutionPlanKind::merge(
            &mut current,
            ExecutionPlanPatch {
                steps: Some(vec![PlanStep::pending(1, "type", "fill form")]),
                ..ExecutionPlanPatch::default()
            },
        );
        let steps = current.steps.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "type");
        assert_eq!(current.objective.as_deref(), Some(""));
    }

    #[test]
    fn patch_skips_absent_fields() {
        let delta = ExecutionPlanPatch {
            progress: Some(0.5),
            ..ExecutionPlanPatch::default()
        };
        let json = serde_json::to_value(&delta).unwrap();
        assert_eq!(json, serde_json::json!({ "progress": 0.5 }));
    }

    #[test]
    fn invariants_catch_overcount() {
        let plan = ExecutionPlan {
            objective: "o".into(),
            approach: "a".into(),
            total_steps: 1,
            completed_steps: 2,
            current_step: 0,
            steps: vec![],
            progress: 2.0,
            estimated_time_remaining: None,
        };
        let err = ExecutionPlanKind::check_invariants(&plan).unwrap_err();
        assert!(err.touches("/completedSteps"));
        assert!(err.touches("/progress"));
    }
}
