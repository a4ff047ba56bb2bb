//! In-memory artifact store
//!
//! [`ArtifactStore`] keeps `container -> artifact id -> entry` in persistent
//! `im` maps. Every write builds a new version and swaps it in, so a
//! [`StoreSnapshot`] taken earlier keeps reading the values it saw. Writes
//! are announced on a broadcast change feed.
//!
//! A store hands out one [`StoreWriter`] per container; those are the
//! [`ArtifactWriter`] sinks that sessions publish to.

use crate::error::{FailureCause, WriterError};
use crate::writer::ArtifactWriter;
use artifact_core::{ArtifactId, ArtifactMetadata, ArtifactStatus, Fingerprint, MetadataPatch};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Default change feed capacity
pub const DEFAULT_CHANGE_CAPACITY: usize = 1024;

/// Grouping key for artifacts (e.g. one conversation or one agent run)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContainerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ContainerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Stored state of one artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredArtifact {
    pub metadata: ArtifactMetadata,
    pub data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<FailureCause>,
}

impl StoredArtifact {
    fn new(id: ArtifactId) -> Self {
        Self {
            metadata: ArtifactMetadata::placeholder(id),
            data: Map::new(),
            error: None,
        }
    }

    /// Shallow-merge a delta: each top-level key replaces the stored one
    fn merge_data(&mut self, delta: &Value) -> Result<(), WriterError> {
        let Value::Object(fields) = delta else {
            return Err(WriterError::Rejected(format!(
                "delta for {} must be a JSON object",
                self.metadata.id
            )));
        };
        for (key, value) in fields {
            self.data.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Digest of the stored data
    ///
    /// # Errors
    /// Returns error if the data cannot be encoded
    pub fn fingerprint(&self) -> Result<Fingerprint, serde_json::Error> {
        Fingerprint::of_json(&self.data)
    }

    /// Failure message, if the artifact ended in `error`
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Artifacts of one container
pub type ContainerArtifacts = im::HashMap<ArtifactId, StoredArtifact>;

type Containers = im::HashMap<ContainerId, ContainerArtifacts>;

/// Kind of write that produced a [`StoreChange`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Data,
    Metadata,
    Complete,
    Error,
}

/// One applied write, as seen on the change feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreChange {
    pub container: ContainerId,
    pub artifact: ArtifactId,
    pub change: ChangeKind,
    pub status: ArtifactStatus,
}

/// Point-in-time view of the whole store
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    containers: Containers,
}

impl StoreSnapshot {
    /// Artifacts of one container
    #[must_use]
    pub fn container(&self, container: &ContainerId) -> Option<&ContainerArtifacts> {
        self.containers.get(container)
    }

    /// One artifact
    #[must_use]
    pub fn get(&self, container: &ContainerId, artifact: &ArtifactId) -> Option<&StoredArtifact> {
        self.containers.get(container)?.get(artifact)
    }

    /// Number of containers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Check if snapshot holds no containers
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Render as `{container: {artifactId: entry}}`
    ///
    /// # Errors
    /// Returns error if an entry cannot be encoded
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        let mut root = Map::new();
        for (container, artifacts) in &self.containers {
            let mut entries = Map::new();
            for (id, stored) in artifacts {
                entries.insert(id.to_string(), serde_json::to_value(stored)?);
            }
            root.insert(container.to_string(), Value::Object(entries));
        }
        Ok(Value::Object(root))
    }
}

struct StoreInner {
    containers: RwLock<Containers>,
    changes: broadcast::Sender<StoreChange>,
}

/// Shared in-memory store, cheap to clone
#[derive(Clone)]
pub struct ArtifactStore {
    inner: Arc<StoreInner>,
}

impl ArtifactStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::with_change_capacity(DEFAULT_CHANGE_CAPACITY)
    }

    /// Create an empty store with a sized change feed
    #[must_use]
    pub fn with_change_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(StoreInner {
                containers: RwLock::new(Containers::new()),
                changes,
            }),
        }
    }

    /// Writer bound to one container
    #[must_use]
    pub fn writer(&self, container: impl Into<ContainerId>) -> StoreWriter {
        let container = container.into();
        debug!(%container, "store writer created");
        StoreWriter {
            store: self.clone(),
            container,
        }
    }

    /// Point-in-time view
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            containers: self.inner.containers.read().clone(),
        }
    }

    /// Copy of one artifact's current entry
    #[must_use]
    pub fn get(&self, container: &ContainerId, artifact: &ArtifactId) -> Option<StoredArtifact> {
        self.inner
            .containers
            .read()
            .get(container)
            .and_then(|artifacts| artifacts.get(artifact).cloned())
    }

    /// Subscribe to the change feed
    ///
    /// Only changes applied after this call are received.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.inner.changes.subscribe()
    }

    fn apply(
        &self,
        container: &ContainerId,
        artifact: &ArtifactId,
        change: ChangeKind,
        f: impl FnOnce(&mut StoredArtifact) -> Result<(), WriterError>,
    ) -> Result<(), WriterError> {
        let status = {
            let mut containers = self.inner.containers.write();
            let mut artifacts = containers.get(container).cloned().unwrap_or_default();
            let mut entry = artifacts
                .get(artifact)
                .cloned()
                .unwrap_or_else(|| StoredArtifact::new(artifact.clone()));
            f(&mut entry)?;
            let status = entry.metadata.status;
            artifacts.insert(artifact.clone(), entry);
            containers.insert(container.clone(), artifacts);
            status
        };

        // No subscribers is fine
        let _ = self.inner.changes.send(StoreChange {
            container: container.clone(),
            artifact: artifact.clone(),
            change,
            status,
        });
        Ok(())
    }
}

impl Default for ArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("containers", &self.inner.containers.read().len())
            .field("subscribers", &self.inner.changes.receiver_count())
            .finish()
    }
}

/// [`ArtifactWriter`] bound to one container of an [`ArtifactStore`]
#[derive(Debug, Clone)]
pub struct StoreWriter {
    store: ArtifactStore,
    container: ContainerId,
}

impl StoreWriter {
    /// Container this writer targets
    #[inline]
    #[must_use]
    pub fn container(&self) -> &ContainerId {
        &self.container
    }

    /// Backing store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }
}

impl ArtifactWriter for StoreWriter {
    fn write_data(&self, id: &ArtifactId, delta: &Value) -> Result<(), WriterError> {
        self.store
            .apply(&self.container, id, ChangeKind::Data, |entry| {
                entry.merge_data(delta)
            })
    }

    fn write_metadata(&self, id: &ArtifactId, patch: &MetadataPatch) -> Result<(), WriterError> {
        self.store
            .apply(&self.container, id, ChangeKind::Metadata, |entry| {
                patch.apply_to(&mut entry.metadata);
                Ok(())
            })
    }

    fn write_complete(&self, id: &ArtifactId) -> Result<(), WriterError> {
        self.store
            .apply(&self.container, id, ChangeKind::Complete, |entry| {
                entry.metadata.status = ArtifactStatus::Complete;
                entry.metadata.touch();
                Ok(())
            })
    }

    fn write_error(&self, id: &ArtifactId, cause: &FailureCause) -> Result<(), WriterError> {
        self.store
            .apply(&self.container, id, ChangeKind::Error, |entry| {
                entry.metadata.status = ArtifactStatus::Error;
                entry.error = Some(cause.clone());
                entry.metadata.touch();
                Ok(())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_deltas_merge_shallowly() {
        let store = ArtifactStore::new();
        let writer = store.writer("conv-1");
        let id = ArtifactId::new("a1");

        writer
            .write_data(&id, &json!({ "objective": "x", "steps": [1] }))
            .unwrap();
        writer.write_data(&id, &json!({ "steps": [1, 2] })).unwrap();

        let stored = store.get(writer.container(), &id).unwrap();
        assert_eq!(stored.data["objective"], "x");
        assert_eq!(stored.data["steps"], json!([1, 2]));
    }

    #[test]
    fn non_object_delta_rejected() {
        let store = ArtifactStore::new();
        let writer = store.writer("conv-1");
        let err = writer
            .write_data(&ArtifactId::new("a1"), &json!([1, 2]))
            .unwrap_err();
        assert!(matches!(err, WriterError::Rejected(_)));
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let store = ArtifactStore::new();
        let writer = store.writer("conv-1");
        let id = ArtifactId::new("a1");
        writer.write_data(&id, &json!({ "summary": "first" })).unwrap();

        let before = store.snapshot();
        writer.write_data(&id, &json!({ "summary": "second" })).unwrap();

        let container = ContainerId::new("conv-1");
        assert_eq!(before.get(&container, &id).unwrap().data["summary"], "first");
        assert_eq!(
            store.snapshot().get(&container, &id).unwrap().data["summary"],
            "second"
        );
    }

    #[test]
    fn error_marker_records_cause() {
        let store = ArtifactStore::new();
        let writer = store.writer("conv-1");
        let id = ArtifactId::new("a1");
        writer
            .write_error(&id, &FailureCause::producer("Execution failed"))
            .unwrap();

        let stored = store.get(writer.container(), &id).unwrap();
        assert_eq!(stored.metadata.status, ArtifactStatus::Error);
        assert_eq!(stored.error_message().as_deref(), Some("Execution failed"));
    }

    #[test]
    fn containers_are_separate() {
        let store = ArtifactStore::new();
        let id = ArtifactId::new("a1");
        store.writer("a").write_data(&id, &json!({ "k": 1 })).unwrap();
        store.writer("b").write_data(&id, &json!({ "k": 2 })).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&"a".into(), &id).unwrap().data["k"], 1);
        assert_eq!(snapshot.get(&"b".into(), &id).unwrap().data["k"], 2);
    }

    #[test]
    fn change_feed_reports_writes() {
        let store = ArtifactStore::new();
        let mut changes = store.subscribe();
        let writer = store.writer("conv-1");
        let id = ArtifactId::new("a1");

        writer.write_data(&id, &json!({ "k": 1 })).unwrap();
        writer.write_complete(&id).unwrap();

        let first = changes.try_recv().unwrap();
        assert_eq!(first.change, ChangeKind::Data);
        assert_eq!(first.status, ArtifactStatus::Streaming);
        let second = changes.try_recv().unwrap();
        assert_eq!(second.change, ChangeKind::Complete);
        assert_eq!(second.status, ArtifactStatus::Complete);
    }

    #[test]
    fn fingerprint_tracks_data_only() {
        let store = ArtifactStore::new();
        let id = ArtifactId::new("a1");
        let a = store.writer("a");
        let b = store.writer("b");
        a.write_data(&id, &json!({ "k": 1 })).unwrap();
        b.write_data(&id, &json!({ "k": 1 })).unwrap();
        b.write_complete(&id).unwrap();

        let snapshot = store.snapshot();
        let fa = snapshot.get(&"a".into(), &id).unwrap().fingerprint().unwrap();
        let fb = snapshot.get(&"b".into(), &id).unwrap().fingerprint().unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn snapshot_json_shape() {
        let store = ArtifactStore::new();
        let writer = store.writer("conv-1");
        writer
            .write_data(&ArtifactId::new("a1"), &json!({ "k": 1 }))
            .unwrap();
        let json = store.snapshot().to_json().unwrap();
        assert_eq!(json["conv-1"]["a1"]["data"]["k"], 1);
        assert_eq!(json["conv-1"]["a1"]["metadata"]["status"], "streaming");
    }
}
