//! Scripted producer run against an in-memory store
//!
//! Streams an execution plan and its tool results side by side, one step at
//! a time, then returns the store contents as JSON.

use anyhow::{Context, Result};
use artifact_aggregate::{
    append_tool_result, complete_plan_step, fail_plan_step, set_plan_steps, start_plan_step,
};
use artifact_core::kinds::{
    ExecutionPlanKind, ExecutionPlanPatch, PlanStep, ToolCall, ToolResultsKind,
};
use artifact_core::Descriptor;
use artifact_stream::{
    ArtifactStore, ArtifactWriter, ChannelWriter, StreamConfig, StreamDescriptor,
};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

/// What the simulated producer does
#[derive(Debug, Clone)]
pub(crate) struct Scenario {
    pub(crate) container: String,
    pub(crate) objective: String,
    pub(crate) steps: u32,
    /// 1-based step whose tool call fails, ending the run
    pub(crate) fail_step: Option<u32>,
    /// Route writes through a [`ChannelWriter`]
    pub(crate) queued: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            container: "simulation".into(),
            objective: "Collect prices from three vendors".into(),
            steps: 3,
            fail_step: None,
            queued: false,
        }
    }
}

/// Run the scenario and render the final store
///
/// # Errors
/// Returns error if a session rejects a call or the store cannot be encoded
pub(crate) async fn run(scenario: &Scenario, config: &StreamConfig) -> Result<Value> {
    let store = ArtifactStore::new();
    let mut feed = store.subscribe();
    let sink = store.writer(scenario.container.as_str());

    if scenario.queued {
        let (writer, drain) = ChannelWriter::spawn(sink, config.writer_channel_capacity);
        drive(&writer, scenario, config)?;
        drop(writer);
        let stats = drain.await.context("drain task panicked")?;
        info!(applied = stats.applied, failed = stats.failed, "queued writes drained");
    } else {
        drive(&sink, scenario, config)?;
    }

    let mut changes = 0_u64;
    loop {
        match feed.try_recv() {
            Ok(change) => {
                changes += 1;
                debug!(
                    artifact_id = %change.artifact,
                    change = ?change.change,
                    status = %change.status,
                    "store change"
                );
            }
            Err(TryRecvError::Lagged(skipped)) => changes += skipped,
            Err(_) => break,
        }
    }
    info!(changes, "simulation finished");

    Ok(store.snapshot().to_json()?)
}

fn drive<W>(writer: &W, scenario: &Scenario, config: &StreamConfig) -> Result<()>
where
    W: ArtifactWriter + Clone + 'static,
{
    let plans = Descriptor::<ExecutionPlanKind>::define()?;
    let tools = Descriptor::<ToolResultsKind>::define()?;
    let plan = plans.stream_with(writer.clone(), config.clone());
    let results = tools.stream_with(writer.clone(), config.clone());
    info!(plan = %plan.id(), tool_results = %results.id(), "sessions started");

    plan.update(ExecutionPlanPatch {
        objective: Some(scenario.objective.clone()),
        approach: Some("Work through the steps in order".into()),
        ..ExecutionPlanPatch::default()
    })?;
    let steps = (1..=scenario.steps)
        .map(|n| PlanStep::pending(n, format!("step-{n}"), format!("scripted step {n}")))
        .collect();
    set_plan_steps(&plan, steps)?;

    for (index, number) in (1..=scenario.steps).enumerate() {
        start_plan_step(&plan, index)?;
        let tool = if number % 2 == 0 { "extract" } else { "navigate" };
        let args = json!({ "step": number });
        let duration = u64::from(number) * 50;

        if scenario.fail_step == Some(number) {
            append_tool_result(
                &results,
                ToolCall::failed(tool, args, "simulated tool failure", duration),
            )?;
            fail_plan_step(&plan, index, "simulated tool failure")?;
            plan.error(format!("step {number} failed"))?;
            results.complete()?;
            warn!(step = number, "simulation stopped on failed step");
            return Ok(());
        }

        append_tool_result(
            &results,
            ToolCall::succeeded(tool, args, json!({ "ok": true }), duration),
        )?;
        complete_plan_step(&plan, index, Some(format!("step {number} done")))?;
    }

    plan.complete_validated()?;
    results.complete_validated()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entries(store: &Value, container: &str) -> Vec<Value> {
        store[container].as_object().unwrap().values().cloned().collect()
    }

    fn by_key<'a>(entries: &'a [Value], key: &str) -> &'a Value {
        entries
            .iter()
            .find(|e| e["data"].get(key).is_some())
            .unwrap()
    }

    #[tokio::test]
    async fn completes_every_step() {
        let store = run(&Scenario::default(), &StreamConfig::default())
            .await
            .unwrap();
        let entries = entries(&store, "simulation");
        assert_eq!(entries.len(), 2);

        let plan = by_key(&entries, "steps");
        assert_eq!(plan["metadata"]["status"], "complete");
        assert_eq!(plan["data"]["completedSteps"], 3);
        assert_eq!(plan["data"]["progress"], json!(1.0));

        let tools = by_key(&entries, "toolCalls");
        assert_eq!(tools["data"]["summary"]["totalCalls"], 3);
        assert_eq!(tools["data"]["summary"]["averageDuration"], json!(100.0));
    }

    #[tokio::test]
    async fn failure_ends_plan_in_error() {
        let scenario = Scenario {
            fail_step: Some(2),
            queued: true,
            ..Scenario::default()
        };
        let store = run(&scenario, &StreamConfig::default()).await.unwrap();
        let entries = entries(&store, "simulation");

        let plan = by_key(&entries, "steps");
        assert_eq!(plan["metadata"]["status"], "error");
        assert_eq!(plan["error"]["message"], "step 2 failed");
        assert_eq!(plan["data"]["steps"][1]["status"], "failed");

        let tools = by_key(&entries, "toolCalls");
        assert_eq!(tools["metadata"]["status"], "complete");
        assert_eq!(tools["data"]["summary"]["errorCount"], 1);
    }
}
