//! Tool Results Artifact Kind
//!
//! Append-only log of tool invocations plus a derived summary
//! (call counts, success/error split, mean duration, usage histogram).

use crate::kind::{private, replace_if_present, ArtifactKind};
use crate::metadata::now_ms;
use crate::validation::{ValidationError, Violation};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tool results kind marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolResultsKind;

impl private::Sealed for ToolResultsKind {}

impl ArtifactKind for ToolResultsKind {
    type Data = ToolResults;
    type Patch = ToolResultsPatch;

    const KIND: &'static str = "tool_results";
    const VERSION: u32 = 1;

    fn default_patch() -> Self::Patch {
        ToolResultsPatch {
            tool_calls: Some(Vec::new()),
            summary: Some(ToolSummary::default()),
        }
    }

    fn merge(current: &mut Self::Patch, delta: Self::Patch) {
        current.merge(delta);
    }

    fn check_invariants(data: &Self::Data) -> Result<(), ValidationError> {
        let expected = ToolSummary::from_calls(&data.tool_calls);
        let summary = &data.summary;
        let mut violations = Vec::new();
        if summary.total_calls != expected.total_calls {
            violations.push(Violation::new(
                "/summary/totalCalls",
                format!(
                    "summary counts {} calls but {} are recorded",
                    summary.total_calls, expected.total_calls
                ),
            ));
        }
        if summary.success_count + summary.error_count != summary.total_calls {
            violations.push(Violation::new(
                "/summary",
                "success and error counts do not add up to total calls",
            ));
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(Self::KIND, violations))
        }
    }
}

/// Complete tool results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolResults {
    /// Calls in invocation order
    pub tool_calls: Vec<ToolCall>,
    /// Aggregates over `tool_calls`
    pub summary: ToolSummary,
}

/// One tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Tool name (e.g. `click_element`)
    pub tool_name: String,
    /// Arguments as sent to the tool
    pub args: Value,
    /// Tool output (`null` on failure)
    pub result: Value,
    /// Wall time in milliseconds
    pub duration: u64,
    /// Whether the call succeeded
    pub success: bool,
    /// Completion time, epoch milliseconds
    pub timestamp: i64,
    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCall {
    /// Successful call stamped now
    #[must_use]
    pub fn succeeded(tool_name: impl Into<String>, args: Value, result: Value, duration: u64) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            result,
            duration,
            success: true,
            timestamp: now_ms(),
            error: None,
        }
    }

    /// Failed call stamped now
    #[must_use]
    pub fn failed(
        tool_name: impl Into<String>,
        args: Value,
        error: impl Into<String>,
        duration: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            args,
            result: Value::Null,
            duration,
            success: false,
            timestamp: now_ms(),
            error: Some(error.into()),
        }
    }
}

/// Derived statistics over a call list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    /// Number of calls
    pub total_calls: u32,
    /// Calls with `success == true`
    pub success_count: u32,
    /// Calls with `success == false`
    pub error_count: u32,
    /// Mean duration in milliseconds (0 when empty)
    pub average_duration: f64,
    /// Calls per tool name
    pub tool_usage: BTreeMap<String, u32>,
}

impl ToolSummary {
    /// Recompute from scratch
    ///
    /// # Performance
    /// O(n) over the call list.
    #[must_use]
    pub fn from_calls(calls: &[ToolCall]) -> Self {
        let mut summary = Self::default();
        let mut total_duration: u128 = 0;
        for call in calls {
            summary.total_calls += 1;
            if call.success {
                summary.success_count += 1;
            } else {
                summary.error_count += 1;
            }
            total_duration += u128::from(call.duration);
            *summary.tool_usage.entry(call.tool_name.clone()).or_default() += 1;
        }
        if !calls.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let mean = total_duration as f64 / calls.len() as f64;
            summary.average_duration = mean;
        }
        summary
    }

    /// Fraction of successful calls (0 when empty)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            f64::from(self.success_count) / f64::from(self.total_calls)
        }
    }
}

/// Partial tool results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(missing_docs)]
pub struct ToolResultsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ToolSummary>,
}

impl ToolResultsPatch {
    /// Top-level merge; both fields are replaced wholesale
    ///
    /// Appending a call is the caller's job: build the extended list first.
    pub fn merge(&mut self, delta: Self) {
        replace_if_present(&mut self.tool_calls, delta.tool_calls);
        replace_if_present(&mut self.summary, delta.summary);
    }
}

impl From<ToolResults> for ToolResultsPatch {
    fn from(results: ToolResults) -> Self {
        Self {
            tool_calls: Some(results.tool_calls),
            summary: Some(results.summary),
        }
    }
}
