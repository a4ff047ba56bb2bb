//! Artifact Aggregate
//!
//! Helpers that keep derived fields consistent while an artifact streams.
//!
//! # Core Concepts
//!
//! - Plan progress: step moves recount `completedSteps`, `progress`, `currentStep`
//! - Tool results: appended calls recompute the summary
//! - Records: whole-value publishing for page context, evaluation, summary
//!
//! Every session helper has a pure counterpart (`*_delta`) that computes the
//! delta from a current value without touching a session.
//!
//! # Example
//!
//! ```rust,ignore
//! use artifact_aggregate::{set_plan_steps, start_plan_step, complete_plan_step};
//!
//! let plan = plans.stream(store.writer("run-1"));
//! set_plan_steps(&plan, steps)?;
//! start_plan_step(&plan, 0)?;
//! complete_plan_step(&plan, 0, Some("page loaded".into()))?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod plan;
mod records;
mod tools;

pub use error::AggregateError;
pub use plan::{
    complete_plan_step, completed_count, fail_plan_step, plan_steps_delta, progress_ratio,
    set_plan_steps, start_plan_step, step_progress_delta, update_execution_plan_progress,
};
pub use records::{record_evaluation, record_page_context, record_summary};
pub use tools::{append_tool_result, record_tool_call, tool_call_delta};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
