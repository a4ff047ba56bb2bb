//! Testing utilities for the artifact streaming workspace
//!
//! Shared fixtures and a recording writer.

#![allow(missing_docs)]

use artifact_core::kinds::{
    Evaluation, ExecutionPlan, ExecutionPlanKind, FormField, FormInfo, Link, Outcome, PageContext,
    PlanStep, Quality, Summarization, ToolCall, Viewport,
};
use artifact_core::{ArtifactId, ArtifactStatus, Descriptor, MetadataPatch};
use artifact_stream::{ArtifactWriter, FailureCause, WriteOp, WriterError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Writer that records every call in order
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    ops: Arc<Mutex<Vec<WriteOp>>>,
    fail_with: Arc<Mutex<Option<WriterError>>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record calls but report `error` for each of them
    pub fn failing(error: WriterError) -> Self {
        let writer = Self::default();
        *writer.fail_with.lock() = Some(error);
        writer
    }

    pub fn ops(&self) -> Vec<WriteOp> {
        self.ops.lock().clone()
    }

    pub fn ops_for(&self, id: &ArtifactId) -> Vec<WriteOp> {
        self.ops
            .lock()
            .iter()
            .filter(|op| op.id() == id)
            .cloned()
            .collect()
    }

    /// Operation names in call order
    pub fn names(&self) -> Vec<&'static str> {
        self.ops.lock().iter().map(WriteOp::name).collect()
    }

    /// Every data delta, in call order
    pub fn deltas(&self) -> Vec<Value> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                WriteOp::Data { delta, .. } => Some(delta.clone()),
                _ => None,
            })
            .collect()
    }

    /// Statuses carried by metadata patches, in call order
    pub fn statuses(&self) -> Vec<ArtifactStatus> {
        self.ops
            .lock()
            .iter()
            .filter_map(|op| match op {
                WriteOp::Metadata { patch, .. } => patch.status,
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.ops.lock().clear();
    }

    fn record(&self, op: WriteOp) -> Result<(), WriterError> {
        self.ops.lock().push(op);
        match self.fail_with.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl ArtifactWriter for RecordingWriter {
    fn write_data(&self, id: &ArtifactId, delta: &Value) -> Result<(), WriterError> {
        self.record(WriteOp::Data {
            id: id.clone(),
            delta: delta.clone(),
        })
    }

    fn write_metadata(&self, id: &ArtifactId, patch: &MetadataPatch) -> Result<(), WriterError> {
        self.record(WriteOp::Metadata {
            id: id.clone(),
            patch: patch.clone(),
        })
    }

    fn write_complete(&self, id: &ArtifactId) -> Result<(), WriterError> {
        self.record(WriteOp::Complete { id: id.clone() })
    }

    fn write_error(&self, id: &ArtifactId, cause: &FailureCause) -> Result<(), WriterError> {
        self.record(WriteOp::Error {
            id: id.clone(),
            cause: cause.clone(),
        })
    }
}

pub fn plan_descriptor() -> Arc<Descriptor<ExecutionPlanKind>> {
    Descriptor::<ExecutionPlanKind>::define().unwrap()
}

/// `count` pending steps numbered from 1
pub fn sample_steps(count: u32) -> Vec<PlanStep> {
    (1..=count)
        .map(|n| PlanStep::pending(n, format!("action-{n}"), format!("reason for step {n}")))
        .collect()
}

pub fn sample_plan(count: u32) -> ExecutionPlan {
    ExecutionPlan {
        objective: "Find the cheapest flight to Lisbon".into(),
        approach: "Search, compare, book".into(),
        total_steps: count,
        completed_steps: 0,
        current_step: 0,
        steps: sample_steps(count),
        progress: 0.0,
        estimated_time_remaining: None,
    }
}

pub fn tool_call(name: &str, success: bool, duration: u64) -> ToolCall {
    if success {
        ToolCall::succeeded(name, json!({ "q": name }), json!({ "ok": true }), duration)
    } else {
        ToolCall::failed(name, json!({ "q": name }), "tool exploded", duration)
    }
}

pub fn sample_page_context() -> PageContext {
    PageContext {
        url: "https://shop.test/checkout".into(),
        title: "Checkout".into(),
        text_content: "Total: 42.00".into(),
        links: vec![Link {
            text: "Back to cart".into(),
            href: "/cart".into(),
        }],
        forms: vec![FormInfo {
            id: Some("pay".into()),
            action: Some("/pay".into()),
            method: "post".into(),
            fields: vec![FormField {
                name: "email".into(),
                field_type: "email".into(),
                required: true,
            }],
        }],
        viewport: Viewport {
            width: 1280,
            height: 720,
        },
        screenshot: None,
        timestamp: 1_700_000_000_000,
    }
}

pub fn sample_evaluation() -> Evaluation {
    Evaluation {
        quality: Quality::Good,
        score: 0.8,
        completeness: 0.9,
        correctness: 0.75,
        issues: vec!["slow search".into()],
        strengths: vec!["correct fare".into()],
        should_proceed: true,
        retry_strategy: None,
        timestamp: 1_700_000_000_000,
    }
}

pub fn sample_summary() -> Summarization {
    Summarization {
        summary: "Booked the 9:40 flight".into(),
        key_actions: vec!["searched".into(), "compared".into(), "booked".into()],
        outcome: Outcome::Success,
        next_steps: None,
        confidence: 0.9,
        timestamp: 1_700_000_000_000,
    }
}
