//! Artifact Stream
//!
//! Producer-side streaming of typed artifacts.
//!
//! # Core Concepts
//!
//! - [`StreamingSession<K>`]: One artifact in flight; merges deltas, publishes them
//! - [`ArtifactWriter`]: External sink mirroring artifact state
//! - [`ArtifactStore`]: In-memory sink with snapshots and a change feed
//! - [`ChannelWriter`]: Queued sink drained by a background task
//! - [`CancelSignal`]: External abort observed by watched sessions
//!
//! # Example
//!
//! ```rust,ignore
//! use artifact_core::{Descriptor, kinds::{SummarizationKind, SummarizationPatch}};
//! use artifact_stream::{ArtifactStore, StreamDescriptor};
//!
//! let store = ArtifactStore::new();
//! let summaries = Descriptor::<SummarizationKind>::define()?;
//!
//! let session = summaries.stream(store.writer("conversation-1"));
//! session.update(SummarizationPatch {
//!     summary: Some("Booked the flight".into()),
//!     ..Default::default()
//! })?;
//! let done = session.complete()?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cancel;
mod channel;
mod config;
mod error;
mod session;
mod store;
mod writer;

pub use cancel::{cancel_pair, CancelSignal, CancelTrigger};
pub use channel::{ChannelWriter, DrainStats};
pub use config::{ConfigError, StreamConfig};
pub use error::{FailureCause, SessionError, WriterError};
pub use session::{
    CancelHandle, SessionEvent, SessionStats, StreamDescriptor, StreamingSession, Subscription,
};
pub use store::{
    ArtifactStore, ChangeKind, ContainerArtifacts, ContainerId, StoreChange, StoreSnapshot,
    StoreWriter, StoredArtifact, DEFAULT_CHANGE_CAPACITY,
};
pub use writer::{ArtifactWriter, NullWriter, WriteOp};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use artifact_core::kinds::{EvaluationKind, EvaluationPatch, Quality};
    use artifact_core::{ArtifactStatus, Descriptor};

    #[test]
    fn store_mirrors_session() {
        let store = ArtifactStore::new();
        let descriptor = Descriptor::<EvaluationKind>::define().unwrap();
        let session = descriptor.stream(store.writer("run-7"));

        session
            .update(EvaluationPatch {
                quality: Some(Quality::Good),
                score: Some(0.8),
                ..EvaluationPatch::default()
            })
            .unwrap();

        let stored = store.get(&"run-7".into(), session.id()).unwrap();
        assert_eq!(stored.metadata.kind, "evaluation");
        assert_eq!(stored.metadata.status, ArtifactStatus::Streaming);
        assert_eq!(stored.data["quality"], "good");

        session.complete().unwrap();
        let stored = store.get(&"run-7".into(), session.id()).unwrap();
        assert_eq!(stored.metadata.status, ArtifactStatus::Complete);
        assert_eq!(stored.metadata.updated_at, session.metadata().updated_at);
    }

    #[test]
    fn store_records_failure_message() {
        let store = ArtifactStore::new();
        let descriptor = Descriptor::<EvaluationKind>::define().unwrap();
        let session = descriptor.stream(store.writer("run-8"));
        session.error("Execution failed").unwrap();

        let stored = store.get(&"run-8".into(), session.id()).unwrap();
        assert_eq!(stored.metadata.status, ArtifactStatus::Error);
        assert_eq!(stored.error_message().as_deref(), Some("Execution failed"));
    }
}
