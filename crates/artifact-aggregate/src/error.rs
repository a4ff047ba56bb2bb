//! Aggregation errors

use artifact_core::kinds::StepTransitionError;
use artifact_stream::SessionError;

/// Errors from the aggregation helpers
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// Step index past the end of the plan
    #[error("step index {index} out of range (plan has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    /// Step status change outside the step lifecycle
    #[error("step {index}: {source}")]
    IllegalStepTransition {
        index: usize,
        #[source]
        source: StepTransitionError,
    },

    /// Plan larger than the configured bound
    #[error("plan has {count} steps, limit is {max}")]
    TooManySteps { count: usize, max: usize },

    /// The underlying session rejected the delta
    #[error(transparent)]
    Session(#[from] SessionError),
}
