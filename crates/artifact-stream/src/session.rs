//! Streaming sessions
//!
//! A [`StreamingSession`] is the producer side of one artifact instance. It
//! owns the accumulated partial value, forwards every change to its
//! [`ArtifactWriter`], and notifies in-process subscribers.
//!
//! # Lifecycle
//!
//! ```text
//! stream() ──► streaming ──update()──► streaming
//!                  │
//!                  ├──complete()──► complete
//!                  └──error()/cancel/timeout/drop──► error
//! ```
//!
//! Exactly one terminal transition happens per session. Calls after it are
//! rejected with [`SessionError::Terminated`] and have no side effects.
//!
//! # Ordering
//!
//! Operations on one session are serialized. For each operation the writer
//! calls happen first, then subscribers are invoked in registration order.
//! Subscribers run outside the state lock and may read the session.

use crate::cancel::CancelSignal;
use crate::config::StreamConfig;
use crate::error::{FailureCause, SessionError, WriterError};
use crate::writer::ArtifactWriter;
use artifact_core::{
    ArtifactData, ArtifactEnvelope, ArtifactId, ArtifactKind, ArtifactMetadata, ArtifactStatus,
    Descriptor, MetadataPatch,
};
use parking_lot::{Mutex, ReentrantMutex};
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Notification delivered to subscribers
#[derive(Debug)]
pub enum SessionEvent<'a, K: ArtifactKind> {
    /// A delta was merged
    Update {
        current: &'a K::Patch,
        delta: &'a K::Patch,
    },
    /// The session completed with this final snapshot
    Complete { snapshot: &'a ArtifactData<K> },
    /// The session failed
    Error { cause: &'a FailureCause },
}

impl<K: ArtifactKind> SessionEvent<'_, K> {
    /// Event name for logs
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Update { .. } => "update",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this is the last event of the session
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Update { .. })
    }
}

type Listener<K> = Arc<dyn Fn(&SessionEvent<'_, K>) + Send + Sync>;

/// Per-session counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Deltas merged
    pub deltas: u64,
    /// Calls rejected because the session had terminated
    pub rejected_calls: u64,
    /// Writer calls that returned an error
    pub writer_failures: u64,
}

struct SessionState<K: ArtifactKind> {
    metadata: ArtifactMetadata,
    current: K::Patch,
    failure: Option<FailureCause>,
    listeners: Vec<(u64, Listener<K>)>,
    next_listener: u64,
    stats: SessionStats,
}

impl<K: ArtifactKind> SessionState<K> {
    fn listeners(&self) -> Vec<Listener<K>> {
        self.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
    }
}

struct Shared<K: ArtifactKind> {
    id: ArtifactId,
    descriptor: Arc<Descriptor<K>>,
    writer: Arc<dyn ArtifactWriter>,
    config: StreamConfig,
    /// Serializes operations; reentrant so subscribers may call back in
    gate: ReentrantMutex<()>,
    state: Mutex<SessionState<K>>,
    done: watch::Sender<bool>,
}

impl<K: ArtifactKind> Shared<K> {
    fn forward(&self, op: &'static str, result: Result<(), WriterError>) {
        if let Err(e) = result {
            self.state.lock().stats.writer_failures += 1;
            warn!(artifact_id = %self.id, kind = K::KIND, op, "writer call failed: {e}");
        }
    }

    fn reject_if_terminal(
        &self,
        state: &mut SessionState<K>,
        op: &'static str,
    ) -> Result<(), SessionError> {
        let status = state.metadata.status;
        if status.is_terminal() {
            state.stats.rejected_calls += 1;
            warn!(
                artifact_id = %self.id,
                kind = K::KIND,
                %status,
                op,
                "call on terminated session rejected"
            );
            return Err(SessionError::Terminated {
                id: self.id.clone(),
                status,
            });
        }
        Ok(())
    }

    fn update(&self, delta: K::Patch) -> Result<(), SessionError> {
        let _gate = self.gate.lock();
        let (encoded, current, listeners, updated_at, seq) = {
            let mut state = self.state.lock();
            self.reject_if_terminal(&mut state, "update")?;
            let encoded = serde_json::to_value(&delta)?;
            K::merge(&mut state.current, delta.clone());
            let updated_at = state.metadata.touch();
            state.stats.deltas += 1;
            let seq = state.stats.deltas;
            (encoded, state.current.clone(), state.listeners(), updated_at, seq)
        };

        debug!(artifact_id = %self.id, kind = K::KIND, seq, "delta merged");
        if self.config.log_deltas {
            trace!(artifact_id = %self.id, seq, delta = %encoded, "delta body");
        }
        self.forward("data", self.writer.write_data(&self.id, &encoded));
        self.forward(
            "metadata",
            self.writer
                .write_metadata(&self.id, &MetadataPatch::touched(updated_at)),
        );

        let event = SessionEvent::Update {
            current: &current,
            delta: &delta,
        };
        for listener in &listeners {
            listener(&event);
        }
        Ok(())
    }

    fn complete(&self) -> Result<ArtifactData<K>, SessionError> {
        let _gate = self.gate.lock();
        let (envelope, listeners, deltas) = {
            let mut state = self.state.lock();
            self.reject_if_terminal(&mut state, "complete")?;
            state.metadata.transition(ArtifactStatus::Complete)?;
            let envelope = ArtifactEnvelope {
                metadata: state.metadata.clone(),
                data: state.current.clone(),
            };
            (envelope, std::mem::take(&mut state.listeners), state.stats.deltas)
        };
        self.done.send_replace(true);

        let patch = MetadataPatch::touched(envelope.metadata.updated_at)
            .with_status(ArtifactStatus::Complete);
        let snapshot = self.descriptor.attach(envelope)?;
        self.forward("metadata", self.writer.write_metadata(&self.id, &patch));
        self.forward("complete", self.writer.write_complete(&self.id));
        info!(artifact_id = %self.id, kind = K::KIND, deltas, "artifact stream completed");

        let event = SessionEvent::Complete {
            snapshot: &snapshot,
        };
        for (_, listener) in &listeners {
            listener(&event);
        }
        Ok(snapshot)
    }

    fn fail(&self, cause: FailureCause) -> Result<(), SessionError> {
        let _gate = self.gate.lock();
        let (listeners, updated_at) = {
            let mut state = self.state.lock();
            self.reject_if_terminal(&mut state, "error")?;
            state.metadata.transition(ArtifactStatus::Error)?;
            state.failure = Some(cause.clone());
            (std::mem::take(&mut state.listeners), state.metadata.updated_at)
        };
        self.done.send_replace(true);

        let patch = MetadataPatch::touched(updated_at).with_status(ArtifactStatus::Error);
        self.forward("metadata", self.writer.write_metadata(&self.id, &patch));
        self.forward("error", self.writer.write_error(&self.id, &cause));
        warn!(artifact_id = %self.id, kind = K::KIND, %cause, "artifact stream failed");

        let event = SessionEvent::Error { cause: &cause };
        for (_, listener) in &listeners {
            listener(&event);
        }
        Ok(())
    }
}

/// Producer handle for one streaming artifact
///
/// Dropping a session that is still streaming fails it with
/// [`FailureCause::Cancelled`], so the writer never sees an artifact stuck
/// in `streaming`.
pub struct StreamingSession<K: ArtifactKind> {
    shared: Arc<Shared<K>>,
}

impl<K: ArtifactKind> StreamingSession<K> {
    /// Open a session and publish its initial metadata and default data
    #[must_use]
    pub fn start(
        descriptor: Arc<Descriptor<K>>,
        writer: Arc<dyn ArtifactWriter>,
        config: StreamConfig,
    ) -> Self {
        let metadata = descriptor.new_metadata(ArtifactStatus::Streaming);
        let current = descriptor.default_data().clone();
        let id = metadata.id.clone();
        let (done, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            id: id.clone(),
            descriptor,
            writer,
            config,
            gate: ReentrantMutex::new(()),
            state: Mutex::new(SessionState {
                metadata: metadata.clone(),
                current: current.clone(),
                failure: None,
                listeners: Vec::new(),
                next_listener: 0,
                stats: SessionStats::default(),
            }),
            done,
        });

        shared.forward(
            "metadata",
            shared
                .writer
                .write_metadata(&id, &MetadataPatch::from(&metadata)),
        );
        match serde_json::to_value(&current) {
            Ok(defaults) => shared.forward("data", shared.writer.write_data(&id, &defaults)),
            Err(e) => warn!(artifact_id = %id, kind = K::KIND, "default data not encodable: {e}"),
        }
        info!(artifact_id = %id, kind = K::KIND, "artifact stream opened");

        Self { shared }
    }

    /// Artifact id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ArtifactId {
        &self.shared.id
    }

    /// Kind name
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        K::KIND
    }

    /// Owning descriptor
    #[inline]
    #[must_use]
    pub fn descriptor(&self) -> &Arc<Descriptor<K>> {
        &self.shared.descriptor
    }

    /// Session configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }

    /// Current lifecycle status
    #[must_use]
    pub fn status(&self) -> ArtifactStatus {
        self.shared.state.lock().metadata.status
    }

    /// Whether the session still accepts deltas
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.status() == ArtifactStatus::Streaming
    }

    /// Copy of the current metadata
    #[must_use]
    pub fn metadata(&self) -> ArtifactMetadata {
        self.shared.state.lock().metadata.clone()
    }

    /// Copy of the accumulated partial value
    #[must_use]
    pub fn current(&self) -> K::Patch {
        self.shared.state.lock().current.clone()
    }

    /// Point-in-time snapshot, valid in any status
    ///
    /// # Errors
    /// Returns error if behavior cannot be re-attached
    pub fn snapshot(&self) -> Result<ArtifactData<K>, SessionError> {
        let envelope = {
            let state = self.shared.state.lock();
            ArtifactEnvelope {
                metadata: state.metadata.clone(),
                data: state.current.clone(),
            }
        };
        Ok(self.shared.descriptor.attach(envelope)?)
    }

    /// Why the session failed, if it did
    #[must_use]
    pub fn failure(&self) -> Option<FailureCause> {
        self.shared.state.lock().failure.clone()
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        self.shared.state.lock().stats
    }

    /// Number of registered subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.shared.state.lock().listeners.len()
    }

    /// Merge a delta and publish it
    ///
    /// Fields present in `delta` replace the current ones wholesale.
    /// Writer failures are logged and counted, never returned.
    ///
    /// # Errors
    /// Returns [`SessionError::Terminated`] after `complete` or `error`
    pub fn update(&self, delta: K::Patch) -> Result<(), SessionError> {
        self.shared.update(delta)
    }

    /// Build a delta from the current value and publish it atomically
    ///
    /// No other operation on this session interleaves between the read and
    /// the merge.
    ///
    /// # Errors
    /// Returns the builder's error, or [`SessionError::Terminated`]
    pub fn update_with<E, F>(&self, build: F) -> Result<(), E>
    where
        F: FnOnce(&K::Patch) -> Result<K::Patch, E>,
        E: From<SessionError>,
    {
        let _gate = self.shared.gate.lock();
        let current = {
            let mut state = self.shared.state.lock();
            self.shared.reject_if_terminal(&mut state, "update")?;
            state.current.clone()
        };
        let delta = build(&current)?;
        Ok(self.shared.update(delta)?)
    }

    /// Finish the stream
    ///
    /// Returns the final snapshot. The value is not validated here;
    /// consumers call [`ArtifactData::validate`] when they need the typed
    /// value.
    ///
    /// # Errors
    /// Returns [`SessionError::Terminated`] if already terminal
    pub fn complete(&self) -> Result<ArtifactData<K>, SessionError> {
        self.shared.complete()
    }

    /// Validate the accumulated value, then complete
    ///
    /// Returns the snapshot and the typed value. If validation fails the
    /// session is failed with [`FailureCause::SchemaMismatch`] instead.
    ///
    /// # Errors
    /// Returns [`SessionError::Invalid`] on validation failure, or
    /// [`SessionError::Terminated`] if already terminal
    pub fn complete_validated(&self) -> Result<(ArtifactData<K>, K::Data), SessionError> {
        let _gate = self.shared.gate.lock();
        let current = {
            let mut state = self.shared.state.lock();
            self.shared.reject_if_terminal(&mut state, "complete")?;
            state.current.clone()
        };
        match self.shared.descriptor.validate_patch(&current) {
            Ok(value) => Ok((self.shared.complete()?, value)),
            Err(e) => {
                self.shared.fail(FailureCause::schema_mismatch(&e))?;
                Err(SessionError::Invalid(e))
            }
        }
    }

    /// Fail the stream with a producer message
    ///
    /// # Errors
    /// Returns [`SessionError::Terminated`] if already terminal
    pub fn error(&self, message: impl Into<String>) -> Result<(), SessionError> {
        self.shared.fail(FailureCause::producer(message))
    }

    /// Fail the stream with a specific cause
    ///
    /// # Errors
    /// Returns [`SessionError::Terminated`] if already terminal
    pub fn fail(&self, cause: FailureCause) -> Result<(), SessionError> {
        self.shared.fail(cause)
    }

    /// Register a subscriber
    ///
    /// Subscribers only see events after registration; read
    /// [`current`](Self::current) for the state so far. Registering on a
    /// terminated session is a no-op.
    pub fn subscribe<F>(&self, listener: F) -> Subscription<K>
    where
        F: Fn(&SessionEvent<'_, K>) + Send + Sync + 'static,
    {
        let mut state = self.shared.state.lock();
        let id = state.next_listener;
        state.next_listener += 1;
        if state.metadata.status.is_terminal() {
            debug!(artifact_id = %self.shared.id, "subscribe on terminated session ignored");
        } else {
            state.listeners.push((id, Arc::new(listener)));
        }
        Subscription {
            id,
            session: Arc::downgrade(&self.shared),
        }
    }

    /// Handle that can cancel this session from elsewhere
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle<K> {
        CancelHandle {
            session: Arc::downgrade(&self.shared),
        }
    }

    /// Fail the session when `signal` fires or `timeout` elapses
    ///
    /// `timeout` falls back to the configured session timeout. The watcher
    /// exits as soon as the session reaches a terminal state. Must be called
    /// inside a tokio runtime.
    pub fn watch(&self, signal: CancelSignal, timeout: Option<Duration>) -> JoinHandle<()> {
        let handle = self.cancel_handle();
        let mut done = self.shared.done.subscribe();
        let timeout = timeout.or_else(|| self.shared.config.session_timeout());
        let id = self.shared.id.clone();

        tokio::spawn(async move {
            let deadline = async move {
                match timeout {
                    Some(after) => {
                        tokio::time::sleep(after).await;
                        after
                    }
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = done.wait_for(|finished| *finished) => {
                    debug!(artifact_id = %id, "watcher released");
                }
                () = signal.cancelled() => {
                    handle.cancel("cancellation signal fired");
                }
                after = deadline => {
                    handle.time_out(after);
                }
            }
        })
    }
}

impl<K: ArtifactKind> Drop for StreamingSession<K> {
    fn drop(&mut self) {
        if self.is_streaming() {
            let _ = self
                .shared
                .fail(FailureCause::cancelled("session dropped before completion"));
        }
    }
}

impl<K: ArtifactKind> Debug for StreamingSession<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("StreamingSession")
            .field("id", &self.shared.id)
            .field("kind", &K::KIND)
            .field("status", &state.metadata.status)
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}

/// Registration returned by [`StreamingSession::subscribe`]
///
/// Dropping it keeps the subscriber registered.
pub struct Subscription<K: ArtifactKind> {
    id: u64,
    session: Weak<Shared<K>>,
}

impl<K: ArtifactKind> Subscription<K> {
    /// Remove the subscriber
    ///
    /// Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let Some(shared) = self.session.upgrade() else {
            return false;
        };
        let mut state = shared.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|(id, _)| *id != self.id);
        state.listeners.len() != before
    }
}

impl<K: ArtifactKind> Debug for Subscription<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Weak handle that fails a session from outside the producer
pub struct CancelHandle<K: ArtifactKind> {
    session: Weak<Shared<K>>,
}

impl<K: ArtifactKind> CancelHandle<K> {
    /// Fail with [`FailureCause::Cancelled`]
    ///
    /// Returns `true` if this call ended the session.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.fail(FailureCause::cancelled(reason))
    }

    /// Fail with [`FailureCause::Timeout`]
    ///
    /// Returns `true` if this call ended the session.
    pub fn time_out(&self, after: Duration) -> bool {
        self.fail(FailureCause::timeout(after))
    }

    fn fail(&self, cause: FailureCause) -> bool {
        let Some(shared) = self.session.upgrade() else {
            return false;
        };
        // Held across the check so a concurrent finish cannot slip in between
        let _gate = shared.gate.lock();
        if shared.state.lock().metadata.status.is_terminal() {
            return false;
        }
        shared.fail(cause).is_ok()
    }
}

impl<K: ArtifactKind> Clone for CancelHandle<K> {
    fn clone(&self) -> Self {
        Self {
            session: Weak::clone(&self.session),
        }
    }
}

impl<K: ArtifactKind> Debug for CancelHandle<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("alive", &(self.session.strong_count() > 0))
            .finish()
    }
}

/// Open streaming sessions from a descriptor
pub trait StreamDescriptor<K: ArtifactKind> {
    /// Open a session with default configuration
    fn stream<W: ArtifactWriter + 'static>(&self, writer: W) -> StreamingSession<K> {
        self.stream_with(writer, StreamConfig::default())
    }

    /// Open a session with explicit configuration
    fn stream_with<W: ArtifactWriter + 'static>(
        &self,
        writer: W,
        config: StreamConfig,
    ) -> StreamingSession<K>;
}

impl<K: ArtifactKind> StreamDescriptor<K> for Arc<Descriptor<K>> {
    fn stream_with<W: ArtifactWriter + 'static>(
        &self,
        writer: W,
        config: StreamConfig,
    ) -> StreamingSession<K> {
        StreamingSession::start(Arc::clone(self), Arc::new(writer), config)
    }
}
