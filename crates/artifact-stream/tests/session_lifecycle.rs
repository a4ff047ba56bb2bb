//! End-to-end session behavior against real sinks

use artifact_core::kinds::{
    PageContextKind, PageContextPatch, SummarizationKind, SummarizationPatch,
};
use artifact_core::{ArtifactStatus, Descriptor};
use artifact_stream::{
    cancel_pair, ArtifactStore, ChangeKind, ChannelWriter, FailureCause, StreamConfig,
    StreamDescriptor, WriteOp, WriterError,
};
use artifact_test_utils::{sample_page_context, sample_summary, RecordingWriter};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use std::time::Duration;

fn summaries() -> std::sync::Arc<Descriptor<SummarizationKind>> {
    Descriptor::<SummarizationKind>::define().unwrap()
}

#[test]
fn writer_call_sequence_for_successful_stream() {
    let writer = RecordingWriter::new();
    let session = summaries().stream(writer.clone());

    session
        .update(SummarizationPatch {
            summary: Some("halfway".into()),
            ..SummarizationPatch::default()
        })
        .unwrap();
    session.complete().unwrap();

    assert_eq!(
        writer.names(),
        vec!["metadata", "data", "data", "metadata", "metadata", "complete"]
    );
    assert_eq!(
        writer.statuses(),
        vec![ArtifactStatus::Streaming, ArtifactStatus::Complete]
    );
    assert_eq!(writer.deltas()[1], json!({ "summary": "halfway" }));
    assert!(writer.ops().iter().all(|op| op.id() == session.id()));
}

#[test]
fn writer_call_sequence_for_failed_stream() {
    let writer = RecordingWriter::new();
    let session = summaries().stream(writer.clone());
    writer.clear();

    session.error("Execution failed").unwrap();
    assert!(session.update(SummarizationPatch::default()).is_err());

    assert_eq!(writer.names(), vec!["metadata", "error"]);
    assert_eq!(
        writer.ops()[1],
        WriteOp::Error {
            id: session.id().clone(),
            cause: FailureCause::producer("Execution failed"),
        }
    );
}

#[test]
fn failing_writer_never_blocks_the_producer() {
    let writer = RecordingWriter::failing(WriterError::ChannelClosed);
    let session = summaries().stream(writer.clone());
    session.update(sample_summary().into()).unwrap();
    let done = session.complete().unwrap();

    assert_eq!(done.validate().unwrap(), sample_summary());
    assert_eq!(session.stats().writer_failures, 6);
    assert_eq!(writer.ops().len(), 6);
}

#[test]
fn completed_snapshot_round_trips_through_json() {
    let descriptor = Descriptor::<PageContextKind>::define().unwrap();
    let store = ArtifactStore::new();
    let session = descriptor.stream(store.writer("tab-1"));

    session
        .update(PageContextPatch {
            url: Some("https://shop.test/checkout".into()),
            ..PageContextPatch::default()
        })
        .unwrap();
    session.update(sample_page_context().into()).unwrap();
    let done = session.complete().unwrap();

    let parsed = descriptor.parse(&done.serialize().unwrap()).unwrap();
    assert_eq!(parsed.metadata().status, ArtifactStatus::Complete);
    assert_eq!(parsed.validate().unwrap(), sample_page_context());

    let stored = store.get(&"tab-1".into(), session.id()).unwrap();
    assert_eq!(stored.fingerprint().unwrap(), done.fingerprint().unwrap());
}

#[test]
fn store_change_feed_follows_session() {
    let store = ArtifactStore::new();
    let mut changes = store.subscribe();
    let session = summaries().stream(store.writer("conv"));
    session.update(SummarizationPatch::default()).unwrap();
    session.complete().unwrap();

    let kinds: Vec<_> = std::iter::from_fn(|| changes.try_recv().ok())
        .map(|change| change.change)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ChangeKind::Metadata,
            ChangeKind::Data,
            ChangeKind::Data,
            ChangeKind::Metadata,
            ChangeKind::Metadata,
            ChangeKind::Complete,
        ]
    );
}

#[test]
fn dropped_session_is_not_left_streaming() {
    let store = ArtifactStore::new();
    let id = {
        let session = summaries().stream(store.writer("conv"));
        session.id().clone()
    };
    let stored = store.get(&"conv".into(), &id).unwrap();
    assert_eq!(stored.metadata.status, ArtifactStatus::Error);
    assert!(matches!(stored.error, Some(FailureCause::Cancelled { .. })));
}

#[tokio::test]
async fn queued_writer_reaches_store() {
    let store = ArtifactStore::new();
    let config = StreamConfig::new().with_writer_channel_capacity(64);
    let (writer, drained) =
        ChannelWriter::spawn(store.writer("conv"), config.writer_channel_capacity);

    let session = summaries().stream_with(writer, config);
    session.update(sample_summary().into()).unwrap();
    session.complete().unwrap();
    let id = session.id().clone();
    drop(session);

    let stats = drained.await.unwrap();
    assert_eq!(stats.failed, 0);
    let stored = store.get(&"conv".into(), &id).unwrap();
    assert_eq!(stored.metadata.status, ArtifactStatus::Complete);
    assert_eq!(stored.data["summary"], "Booked the 9:40 flight");
}

#[tokio::test(flavor = "current_thread")]
async fn saturated_queue_still_completes() {
    let store = ArtifactStore::new();
    let (writer, drained) = ChannelWriter::spawn(store.writer("conv"), 4);

    // Nothing drains until the test yields, so later updates are merged
    let session = summaries().stream(writer);
    for step in 0..5 {
        session
            .update(SummarizationPatch {
                summary: Some(format!("step {step}")),
                ..SummarizationPatch::default()
            })
            .unwrap();
    }
    session.complete().unwrap();
    let id = session.id().clone();
    assert_eq!(session.stats().writer_failures, 0);
    drop(session);

    let stats = drained.await.unwrap();
    assert_eq!(stats.failed, 0);
    assert!(stats.coalesced > 0);
    let stored = store.get(&"conv".into(), &id).unwrap();
    assert_eq!(stored.metadata.status, ArtifactStatus::Complete);
    assert_eq!(stored.data["summary"], "step 4");
}

#[tokio::test]
async fn timeout_marks_store_entry() {
    let store = ArtifactStore::new();
    let session = summaries().stream(store.writer("conv"));
    let (_trigger, signal) = cancel_pair();
    session
        .watch(signal, Some(Duration::from_millis(15)))
        .await
        .unwrap();

    let stored = store.get(&"conv".into(), session.id()).unwrap();
    assert_eq!(stored.metadata.status, ArtifactStatus::Error);
    assert_eq!(
        stored.error_message().as_deref(),
        Some("timed out after 15ms")
    );
}

proptest! {
    #[test]
    fn updated_at_never_decreases(texts in prop::collection::vec("[a-z]{0,8}", 1..20)) {
        let writer = RecordingWriter::new();
        let session = summaries().stream(writer);
        let mut last = session.metadata().updated_at;
        for text in &texts {
            session.update(SummarizationPatch {
                summary: Some(text.clone()),
                ..SummarizationPatch::default()
            }).unwrap();
            let now = session.metadata().updated_at;
            prop_assert!(now >= last);
            last = now;
        }
        let done = session.complete().unwrap();
        prop_assert!(done.metadata().updated_at >= last);
        prop_assert!(done.metadata().updated_at >= done.metadata().created_at);
    }

    #[test]
    fn last_delta_wins(texts in prop::collection::vec("[a-z]{1,8}", 1..20)) {
        let session = summaries().stream(RecordingWriter::new());
        for text in &texts {
            session.update(SummarizationPatch {
                summary: Some(text.clone()),
                ..SummarizationPatch::default()
            }).unwrap();
        }
        let current = session.current();
        prop_assert_eq!(current.summary.as_ref(), texts.last());
        prop_assert_eq!(session.stats().deltas, texts.len() as u64);
        session.complete().unwrap();
    }
}
