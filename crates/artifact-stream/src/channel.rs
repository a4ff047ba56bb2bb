//! Queued writer backed by a background task
//!
//! [`ChannelWriter`] turns every writer call into a [`WriteOp`] on a tokio
//! channel. A spawned task drains the channel into the real sink in order,
//! so a slow sink never stalls the producer.
//!
//! Once more than `capacity` operations are waiting, data deltas and
//! `updated_at` touches are parked per artifact and merged into one pending
//! write instead of growing the queue. A parked write is flushed ahead of the
//! artifact's next status, completion or error operation, or by the drain
//! task once the queue empties. Nothing is dropped, and the sink sees each
//! artifact's operations in producer order.

use crate::error::{FailureCause, WriterError};
use crate::writer::{ArtifactWriter, WriteOp};
use artifact_core::{ArtifactId, MetadataPatch};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Counters reported by the drain task when the channel closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub applied: u64,
    pub failed: u64,
    /// Writes that were merged into a parked write instead of queued
    pub coalesced: u64,
}

/// Latest parked writes of one artifact
#[derive(Debug, Default)]
struct Parked {
    data: Option<Map<String, Value>>,
    touch: Option<MetadataPatch>,
}

impl Parked {
    fn into_ops(self, id: &ArtifactId) -> impl Iterator<Item = WriteOp> {
        let data = self.data.map(|delta| WriteOp::Data {
            id: id.clone(),
            delta: Value::Object(delta),
        });
        let touch = self.touch.map(|patch| WriteOp::Metadata {
            id: id.clone(),
            patch,
        });
        data.into_iter().chain(touch)
    }
}

#[derive(Debug, Default)]
struct Backlog {
    /// Operations sent but not yet received by the drain task
    depth: AtomicUsize,
    coalesced: AtomicU64,
    /// Guards every enqueue decision together with the parked map
    parked: Mutex<HashMap<ArtifactId, Parked>>,
}

/// Writer that forwards operations to a background task
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    tx: mpsc::UnboundedSender<WriteOp>,
    backlog: Arc<Backlog>,
    capacity: usize,
}

impl ChannelWriter {
    /// Spawn the drain task for `sink`
    ///
    /// Must be called inside a tokio runtime. The task ends once every
    /// clone of the returned writer is dropped and all writes are applied.
    pub fn spawn<W>(sink: W, capacity: usize) -> (Self, JoinHandle<DrainStats>)
    where
        W: ArtifactWriter + 'static,
    {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::unbounded_channel();
        let backlog = Arc::new(Backlog::default());
        let handle = tokio::spawn(drain(sink, rx, Arc::clone(&backlog)));
        debug!(capacity, "channel writer started");
        (
            Self {
                tx,
                backlog,
                capacity,
            },
            handle,
        )
    }

    /// Queue depth above which writes are parked
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn enqueue(&self, op: WriteOp) -> Result<(), WriterError> {
        if self.tx.is_closed() {
            return Err(WriterError::ChannelClosed);
        }
        let mut parked = self.backlog.parked.lock();
        let op = if self.backlog.depth.load(Ordering::Acquire) >= self.capacity {
            match park(&mut parked, op) {
                None => {
                    self.backlog.coalesced.fetch_add(1, Ordering::Relaxed);
                    return Ok(());
                }
                Some(op) => op,
            }
        } else {
            op
        };

        if let Some(pending) = parked.remove(op.id()) {
            for earlier in pending.into_ops(op.id()) {
                self.send(earlier)?;
            }
        }
        self.send(op)
    }

    fn send(&self, op: WriteOp) -> Result<(), WriterError> {
        self.backlog.depth.fetch_add(1, Ordering::AcqRel);
        self.tx.send(op).map_err(|_| {
            self.backlog.depth.fetch_sub(1, Ordering::AcqRel);
            WriterError::ChannelClosed
        })
    }
}

/// Merge `op` into the artifact's parked write, or hand it back if it must
/// be queued
fn park(parked: &mut HashMap<ArtifactId, Parked>, op: WriteOp) -> Option<WriteOp> {
    match op {
        WriteOp::Data {
            id,
            delta: Value::Object(fields),
        } => {
            let entry = parked.entry(id).or_default();
            entry.data.get_or_insert_with(Map::new).extend(fields);
            None
        }
        WriteOp::Metadata { id, patch } if patch.status.is_none() => {
            let entry = parked.entry(id).or_default();
            let touch = entry.touch.get_or_insert_with(MetadataPatch::default);
            touch.kind = patch.kind.or(touch.kind.take());
            touch.version = patch.version.or(touch.version);
            touch.created_at = patch.created_at.or(touch.created_at);
            touch.updated_at = patch.updated_at.or(touch.updated_at);
            None
        }
        other => Some(other),
    }
}

impl ArtifactWriter for ChannelWriter {
    fn write_data(&self, id: &ArtifactId, delta: &Value) -> Result<(), WriterError> {
        self.enqueue(WriteOp::Data {
            id: id.clone(),
            delta: delta.clone(),
        })
    }

    fn write_metadata(&self, id: &ArtifactId, patch: &MetadataPatch) -> Result<(), WriterError> {
        self.enqueue(WriteOp::Metadata {
            id: id.clone(),
            patch: patch.clone(),
        })
    }

    fn write_complete(&self, id: &ArtifactId) -> Result<(), WriterError> {
        self.enqueue(WriteOp::Complete { id: id.clone() })
    }

    fn write_error(&self, id: &ArtifactId, cause: &FailureCause) -> Result<(), WriterError> {
        self.enqueue(WriteOp::Error {
            id: id.clone(),
            cause: cause.clone(),
        })
    }
}

fn apply<W: ArtifactWriter>(sink: &W, op: &WriteOp, stats: &mut DrainStats) {
    match op.apply(sink) {
        Ok(()) => stats.applied += 1,
        Err(e) => {
            stats.failed += 1;
            warn!(artifact_id = %op.id(), op = op.name(), "queued write failed: {e}");
        }
    }
}

fn apply_parked<W: ArtifactWriter>(sink: &W, backlog: &Backlog, stats: &mut DrainStats) {
    let flushed = {
        let mut parked = backlog.parked.lock();
        // Only an empty queue guarantees parked writes are the newest
        if backlog.depth.load(Ordering::Acquire) > 0 {
            return;
        }
        std::mem::take(&mut *parked)
    };
    for (id, pending) in flushed {
        for op in pending.into_ops(&id) {
            apply(sink, &op, stats);
        }
    }
}

async fn drain<W: ArtifactWriter>(
    sink: W,
    mut rx: mpsc::UnboundedReceiver<WriteOp>,
    backlog: Arc<Backlog>,
) -> DrainStats {
    let mut stats = DrainStats::default();
    while let Some(op) = rx.recv().await {
        backlog.depth.fetch_sub(1, Ordering::AcqRel);
        apply(&sink, &op, &mut stats);
        apply_parked(&sink, &backlog, &mut stats);
    }
    apply_parked(&sink, &backlog, &mut stats);
    stats.coalesced = backlog.coalesced.load(Ordering::Relaxed);
    debug!(
        applied = stats.applied,
        failed = stats.failed,
        coalesced = stats.coalesced,
        "channel writer drained"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ArtifactStore;
    use artifact_core::ArtifactStatus;
    use serde_json::json;

    #[tokio::test]
    async fn drains_in_order_into_sink() {
        let store = ArtifactStore::new();
        let (writer, handle) = ChannelWriter::spawn(store.writer("conv-1"), 16);
        let id = ArtifactId::new("a1");

        writer.write_data(&id, &json!({ "summary": "a" })).unwrap();
        writer.write_data(&id, &json!({ "summary": "b" })).unwrap();
        writer.write_complete(&id).unwrap();
        drop(writer);

        let stats = handle.await.unwrap();
        assert_eq!(stats, DrainStats { applied: 3, failed: 0, coalesced: 0 });

        let stored = store.get(&"conv-1".into(), &id).unwrap();
        assert_eq!(stored.data["summary"], "b");
        assert_eq!(stored.metadata.status, ArtifactStatus::Complete);
    }

    #[tokio::test]
    async fn sink_failures_are_counted_not_fatal() {
        let store = ArtifactStore::new();
        let (writer, handle) = ChannelWriter::spawn(store.writer("conv-1"), 4);
        let id = ArtifactId::new("a1");

        writer.write_data(&id, &json!("not an object")).unwrap();
        writer.write_data(&id, &json!({ "k": 1 })).unwrap();
        drop(writer);

        let stats = handle.await.unwrap();
        assert_eq!(stats, DrainStats { applied: 1, failed: 1, coalesced: 0 });
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_merges_data_and_keeps_completion() {
        let store = ArtifactStore::new();
        let (writer, handle) = ChannelWriter::spawn(store.writer("conv-1"), 1);
        let id = ArtifactId::new("a1");

        // The drain task cannot run until this test yields
        writer.write_data(&id, &json!({ "a": 1 })).unwrap();
        writer.write_metadata(&id, &MetadataPatch::touched(5)).unwrap();
        writer.write_data(&id, &json!({ "b": 2 })).unwrap();
        writer.write_data(&id, &json!({ "a": 3 })).unwrap();
        writer.write_complete(&id).unwrap();
        drop(writer);

        let stats = handle.await.unwrap();
        assert_eq!(
            stats,
            DrainStats {
                applied: 4,
                failed: 0,
                coalesced: 3
            }
        );

        let stored = store.get(&"conv-1".into(), &id).unwrap();
        assert_eq!(stored.data["a"], 3);
        assert_eq!(stored.data["b"], 2);
        assert_eq!(stored.metadata.status, ArtifactStatus::Complete);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn parked_writes_flush_once_queue_empties() {
        let store = ArtifactStore::new();
        let (writer, handle) = ChannelWriter::spawn(store.writer("conv-1"), 1);
        let first = ArtifactId::new("a1");
        let second = ArtifactId::new("a2");

        writer.write_data(&first, &json!({ "n": 1 })).unwrap();
        writer.write_data(&second, &json!({ "n": 1 })).unwrap();
        writer.write_data(&second, &json!({ "n": 2 })).unwrap();
        tokio::task::yield_now().await;
        drop(writer);

        let stats = handle.await.unwrap();
        assert_eq!(stats.coalesced, 2);
        assert_eq!(stats.failed, 0);
        assert_eq!(store.get(&"conv-1".into(), &first).unwrap().data["n"], 1);
        assert_eq!(store.get(&"conv-1".into(), &second).unwrap().data["n"], 2);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn errors_are_never_parked() {
        let store = ArtifactStore::new();
        let (writer, handle) = ChannelWriter::spawn(store.writer("conv-1"), 1);
        let id = ArtifactId::new("a1");

        writer.write_data(&id, &json!({ "k": 1 })).unwrap();
        writer.write_data(&id, &json!({ "k": 2 })).unwrap();
        writer
            .write_metadata(&id, &MetadataPatch::default().with_status(ArtifactStatus::Error))
            .unwrap();
        writer
            .write_error(&id, &FailureCause::Cancelled { reason: "stop".into() })
            .unwrap();
        drop(writer);

        let stats = handle.await.unwrap();
        assert_eq!(stats.coalesced, 1);
        assert_eq!(stats.failed, 0);
        let stored = store.get(&"conv-1".into(), &id).unwrap();
        assert_eq!(stored.data["k"], 2);
        assert_eq!(stored.metadata.status, ArtifactStatus::Error);
    }

    #[tokio::test]
    async fn closed_channel_reported() {
        let store = ArtifactStore::new();
        let (writer, handle) = ChannelWriter::spawn(store.writer("conv-1"), 4);
        handle.abort();
        let _ = handle.await;
        assert_eq!(
            writer.write_complete(&ArtifactId::new("a1")),
            Err(WriterError::ChannelClosed)
        );
    }
}
