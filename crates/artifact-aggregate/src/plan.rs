//! Execution plan progress
//!
//! Each step move replaces one step and recounts the derived fields from
//! the full step list:
//!
//! - `completedSteps = count(status == completed)`
//! - `progress = completedSteps / max(totalSteps, steps.len())` (0 for an
//!   empty plan)
//! - `currentStep = index of the moved step`
//!
//! Steps follow `pending -> in_progress -> completed | failed`, and a pending
//! step may finish directly. A step never returns to `pending` and terminal
//! steps never change.

use crate::error::AggregateError;
use artifact_core::kinds::{ExecutionPlanKind, ExecutionPlanPatch, PlanStep, StepStatus};
use artifact_stream::StreamingSession;
use tracing::debug;

/// Count of completed steps
#[must_use]
pub fn completed_count(steps: &[PlanStep]) -> u32 {
    let completed = steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .count();
    u32::try_from(completed).unwrap_or(u32::MAX)
}

/// `completed / total`, or 0 for an empty plan
///
/// Not clamped: a ratio above 1 means the counts disagree and is reported
/// by plan validation.
#[must_use]
pub fn progress_ratio(completed: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(completed) / f64::from(total)
    }
}

/// Delta that moves step `index` to `status`
///
/// `result` replaces the step's result when present.
///
/// # Errors
/// Returns error for an out-of-range index or an illegal step transition
pub fn step_progress_delta(
    plan: &ExecutionPlanPatch,
    index: usize,
    status: StepStatus,
    result: Option<String>,
) -> Result<ExecutionPlanPatch, AggregateError> {
    let mut steps = plan.steps.clone().unwrap_or_default();
    let len = steps.len();
    let step = steps
        .get_mut(index)
        .ok_or(AggregateError::StepOutOfRange { index, len })?;
    step.status
        .validate_transition(status)
        .map_err(|source| AggregateError::IllegalStepTransition { index, source })?;
    step.status = status;
    if result.is_some() {
        step.result = result;
    }

    // A stale totalSteps below the list length must not read as finished
    let listed = u32::try_from(len).unwrap_or(u32::MAX);
    let total = plan.total_steps.map_or(listed, |total| total.max(listed));
    let completed = completed_count(&steps);
    Ok(ExecutionPlanPatch {
        steps: Some(steps),
        completed_steps: Some(completed),
        progress: Some(progress_ratio(completed, total)),
        current_step: Some(u32::try_from(index).unwrap_or(u32::MAX)),
        ..ExecutionPlanPatch::default()
    })
}

/// Delta that installs a fresh step list
///
/// # Errors
/// Returns error if the list is longer than `max_steps`
pub fn plan_steps_delta(
    steps: Vec<PlanStep>,
    max_steps: usize,
) -> Result<ExecutionPlanPatch, AggregateError> {
    if steps.len() > max_steps {
        return Err(AggregateError::TooManySteps {
            count: steps.len(),
            max: max_steps,
        });
    }
    let total = u32::try_from(steps.len()).unwrap_or(u32::MAX);
    let completed = completed_count(&steps);
    Ok(ExecutionPlanPatch {
        total_steps: Some(total),
        completed_steps: Some(completed),
        current_step: Some(0),
        progress: Some(progress_ratio(completed, total)),
        steps: Some(steps),
        ..ExecutionPlanPatch::default()
    })
}

/// Move step `index` of a streaming plan and publish the recomputed fields
///
/// # Errors
/// Returns error for a bad index, an illegal transition, or a terminated
/// session. The session is unchanged on error.
pub fn update_execution_plan_progress(
    session: &StreamingSession<ExecutionPlanKind>,
    index: usize,
    status: StepStatus,
    result: Option<String>,
) -> Result<(), AggregateError> {
    session.update_with(|plan| {
        let delta = step_progress_delta(plan, index, status, result)?;
        debug!(
            artifact_id = %session.id(),
            index,
            %status,
            progress = ?delta.progress,
            "plan step moved"
        );
        Ok(delta)
    })
}

/// Install the plan's steps, bounded by the session's `max_plan_steps`
///
/// # Errors
/// Returns error if the plan is too long or the session terminated
pub fn set_plan_steps(
    session: &StreamingSession<ExecutionPlanKind>,
    steps: Vec<PlanStep>,
) -> Result<(), AggregateError> {
    let delta = plan_steps_delta(steps, session.config().max_plan_steps)?;
    Ok(session.update(delta)?)
}

/// Move step `index` to `in_progress`
///
/// # Errors
/// See [`update_execution_plan_progress`]
pub fn start_plan_step(
    session: &StreamingSession<ExecutionPlanKind>,
    index: usize,
) -> Result<(), AggregateError> {
    update_execution_plan_progress(session, index, StepStatus::InProgress, None)
}

/// Move step `index` to `completed`
///
/// # Errors
/// See [`update_execution_plan_progress`]
pub fn complete_plan_step(
    session: &StreamingSession<ExecutionPlanKind>,
    index: usize,
    result: Option<String>,
) -> Result<(), AggregateError> {
    update_execution_plan_progress(session, index, StepStatus::Completed, result)
}

/// Move step `index` to `failed`, keeping `error` as its result
///
/// # Errors
/// See [`update_execution_plan_progress`]
pub fn fail_plan_step(
    session: &StreamingSession<ExecutionPlanKind>,
    index: usize,
    error: impl Into<String>,
) -> Result<(), AggregateError> {
    update_execution_plan_progress(session, index, StepStatus::Failed, Some(error.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use artifact_core::ArtifactKind;

    fn plan_with(statuses: &[StepStatus]) -> ExecutionPlanPatch {
        let steps: Vec<PlanStep> = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                let mut step = PlanStep::pending(u32::try_from(i).unwrap() + 1, "act", "why");
                step.status = *status;
                step
            })
            .collect();
        let mut plan = ExecutionPlanKind::default_patch();
        plan.merge(plan_steps_delta(steps, 50).unwrap());
        plan
    }

    #[test]
    fn progress_is_zero_for_empty_plan() {
        assert!(progress_ratio(0, 0).abs() < f64::EPSILON);
        assert!((progress_ratio(1, 4) - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn moving_a_step_recounts() {
        let plan = plan_with(&[StepStatus::Completed, StepStatus::InProgress, StepStatus::Pending]);
        let delta = step_progress_delta(&plan, 1, StepStatus::Completed, Some("ok".into())).unwrap();

        assert_eq!(delta.completed_steps, Some(2));
        assert_eq!(delta.current_step, Some(1));
        let progress = delta.progress.unwrap();
        assert!((progress - 2.0 / 3.0).abs() < 1e-12);
        let steps = delta.steps.unwrap();
        assert_eq!(steps[1].result.as_deref(), Some("ok"));
        assert!(delta.objective.is_none());
    }

    #[test]
    fn result_kept_when_absent() {
        let mut plan = plan_with(&[StepStatus::InProgress]);
        plan.steps.as_mut().unwrap()[0].result = Some("interim".into());
        let delta = step_progress_delta(&plan, 0, StepStatus::Completed, None).unwrap();
        assert_eq!(delta.steps.unwrap()[0].result.as_deref(), Some("interim"));
    }

    #[test]
    fn rejects_out_of_range() {
        let plan = plan_with(&[StepStatus::Pending]);
        assert!(matches!(
            step_progress_delta(&plan, 3, StepStatus::InProgress, None),
            Err(AggregateError::StepOutOfRange { index: 3, len: 1 })
        ));
    }

    #[test]
    fn rejects_regression_and_terminal_moves() {
        let plan = plan_with(&[StepStatus::Completed, StepStatus::InProgress]);
        assert!(matches!(
            step_progress_delta(&plan, 0, StepStatus::Pending, None),
            Err(AggregateError::IllegalStepTransition { index: 0, .. })
        ));
        assert!(matches!(
            step_progress_delta(&plan, 0, StepStatus::Failed, None),
            Err(AggregateError::IllegalStepTransition { index: 0, .. })
        ));
        assert!(matches!(
            step_progress_delta(&plan, 1, StepStatus::Pending, None),
            Err(AggregateError::IllegalStepTransition { index: 1, .. })
        ));
    }

    #[test]
    fn pending_step_can_finish_directly() {
        let plan = plan_with(&[StepStatus::Pending, StepStatus::Pending]);
        let delta = step_progress_delta(&plan, 1, StepStatus::Completed, None).unwrap();
        assert_eq!(delta.completed_steps, Some(1));
        assert_eq!(delta.current_step, Some(1));
        assert!((delta.progress.unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn stale_total_does_not_inflate_progress() {
        let mut plan = plan_with(&[StepStatus::Pending, StepStatus::Pending, StepStatus::Pending]);
        plan.total_steps = Some(1);
        let delta = step_progress_delta(&plan, 0, StepStatus::Completed, None).unwrap();
        let progress = delta.progress.unwrap();
        assert!((progress - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn ratio_is_not_clamped() {
        assert!((progress_ratio(3, 2) - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn plan_steps_bounded() {
        let steps = (1..=4).map(|n| PlanStep::pending(n, "a", "r")).collect();
        assert!(matches!(
            plan_steps_delta(steps, 3),
            Err(AggregateError::TooManySteps { count: 4, max: 3 })
        ));
    }
}
