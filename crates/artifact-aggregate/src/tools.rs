//! Tool call log aggregation
//!
//! Calls are appended in arrival order, never deduplicated. The summary is
//! recomputed from the full list on every append.

use crate::error::AggregateError;
use artifact_core::kinds::{ToolCall, ToolResultsKind, ToolResultsPatch, ToolSummary};
use artifact_stream::StreamingSession;
use serde_json::Value;
use tracing::debug;

/// Delta appending `call` to the current log
#[must_use]
pub fn tool_call_delta(current: &ToolResultsPatch, call: ToolCall) -> ToolResultsPatch {
    let mut calls = current.tool_calls.clone().unwrap_or_default();
    calls.push(call);
    let summary = ToolSummary::from_calls(&calls);
    ToolResultsPatch {
        tool_calls: Some(calls),
        summary: Some(summary),
    }
}

/// Append one call and publish the recomputed summary
///
/// # Errors
/// Returns error if the session terminated
pub fn append_tool_result(
    session: &StreamingSession<ToolResultsKind>,
    call: ToolCall,
) -> Result<(), AggregateError> {
    session.update_with(|current| {
        let delta = tool_call_delta(current, call);
        if let Some(summary) = &delta.summary {
            debug!(
                artifact_id = %session.id(),
                total = summary.total_calls,
                errors = summary.error_count,
                "tool call appended"
            );
        }
        Ok(delta)
    })
}

/// Append a call built from its outcome
///
/// `Ok` values become successful calls with that result, `Err` messages
/// become failed calls.
///
/// # Errors
/// Returns error if the session terminated
pub fn record_tool_call(
    session: &StreamingSession<ToolResultsKind>,
    tool_name: &str,
    args: Value,
    outcome: Result<Value, String>,
    duration: u64,
) -> Result<(), AggregateError> {
    let call = match outcome {
        Ok(result) => ToolCall::succeeded(tool_name, args, result, duration),
        Err(error) => ToolCall::failed(tool_name, args, error, duration),
    };
    append_tool_result(session, call)
}
