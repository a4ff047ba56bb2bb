//! Built-in Artifact Kinds
//!
//! - Execution plan: steps with per-step status and derived progress
//! - Tool results: append-only call log with a derived summary
//! - Page context: snapshot of the current browser page
//! - Evaluation: quality verdict on an execution
//! - Summarization: final narrative of what happened

pub mod evaluation;
pub mod execution_plan;
pub mod page_context;
pub mod summarization;
pub mod tool_results;

// Re-export common types
pub use evaluation::{Evaluation, EvaluationKind, EvaluationPatch, Quality};
pub use execution_plan::{
    ExecutionPlan, ExecutionPlanKind, ExecutionPlanPatch, PlanStep, StepStatus,
    StepTransitionError, MAX_PLAN_STEPS,
};
pub use page_context::{
    FormField, FormInfo, Link, PageContext, PageContextKind, PageContextPatch, Viewport,
};
pub use summarization::{Outcome, Summarization, SummarizationKind, SummarizationPatch};
pub use tool_results::{ToolCall, ToolResults, ToolResultsKind, ToolResultsPatch, ToolSummary};
