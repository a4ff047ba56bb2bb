//! Writer sink abstraction
//!
//! An [`ArtifactWriter`] is the opaque external sink that mirrors artifact
//! state for downstream consumers. Sessions forward four operations to it:
//!
//! - `write_data`: a JSON delta to merge into the stored data
//! - `write_metadata`: a partial metadata update
//! - `write_complete`: the terminal success marker
//! - `write_error`: the terminal failure marker and its cause
//!
//! Implementations must be cheap and non-blocking; the session calls them
//! synchronously. Slow sinks belong behind a
//! [`ChannelWriter`](crate::ChannelWriter).

use crate::error::{FailureCause, WriterError};
use artifact_core::{ArtifactId, MetadataPatch};
use serde_json::Value;
use std::sync::Arc;

/// External sink for artifact state
#[cfg_attr(test, mockall::automock)]
pub trait ArtifactWriter: Send + Sync {
    /// Merge a JSON delta into the stored data
    ///
    /// # Errors
    /// Returns error if the sink refuses or cannot accept the delta
    fn write_data(&self, id: &ArtifactId, delta: &Value) -> Result<(), WriterError>;

    /// Merge a partial metadata update
    ///
    /// # Errors
    /// Returns error if the sink refuses or cannot accept the update
    fn write_metadata(&self, id: &ArtifactId, patch: &MetadataPatch) -> Result<(), WriterError>;

    /// Mark the artifact complete
    ///
    /// # Errors
    /// Returns error if the sink cannot record the marker
    fn write_complete(&self, id: &ArtifactId) -> Result<(), WriterError>;

    /// Mark the artifact failed
    ///
    /// # Errors
    /// Returns error if the sink cannot record the marker
    fn write_error(&self, id: &ArtifactId, cause: &FailureCause) -> Result<(), WriterError>;
}

impl<W: ArtifactWriter + ?Sized> ArtifactWriter for Arc<W> {
    #[inline]
    fn write_data(&self, id: &ArtifactId, delta: &Value) -> Result<(), WriterError> {
        (**self).write_data(id, delta)
    }

    #[inline]
    fn write_metadata(&self, id: &ArtifactId, patch: &MetadataPatch) -> Result<(), WriterError> {
        (**self).write_metadata(id, patch)
    }

    #[inline]
    fn write_complete(&self, id: &ArtifactId) -> Result<(), WriterError> {
        (**self).write_complete(id)
    }

    #[inline]
    fn write_error(&self, id: &ArtifactId, cause: &FailureCause) -> Result<(), WriterError> {
        (**self).write_error(id, cause)
    }
}

/// One writer operation, as queued by [`ChannelWriter`](crate::ChannelWriter)
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Data { id: ArtifactId, delta: Value },
    Metadata { id: ArtifactId, patch: MetadataPatch },
    Complete { id: ArtifactId },
    Error { id: ArtifactId, cause: FailureCause },
}

impl WriteOp {
    /// Target artifact
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ArtifactId {
        match self {
            Self::Data { id, .. }
            | Self::Metadata { id, .. }
            | Self::Complete { id }
            | Self::Error { id, .. } => id,
        }
    }

    /// Operation name for logs
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Data { .. } => "data",
            Self::Metadata { .. } => "metadata",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// Replay this operation against `writer`
    ///
    /// # Errors
    /// Returns whatever the writer returns
    pub fn apply<W: ArtifactWriter + ?Sized>(&self, writer: &W) -> Result<(), WriterError> {
        match self {
            Self::Data { id, delta } => writer.write_data(id, delta),
            Self::Metadata { id, patch } => writer.write_metadata(id, patch),
            Self::Complete { id } => writer.write_complete(id),
            Self::Error { id, cause } => writer.write_error(id, cause),
        }
    }
}

/// Writer that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWriter;

impl ArtifactWriter for NullWriter {
    fn write_data(&self, _id: &ArtifactId, _delta: &Value) -> Result<(), WriterError> {
        Ok(())
    }

    fn write_metadata(&self, _id: &ArtifactId, _patch: &MetadataPatch) -> Result<(), WriterError> {
        Ok(())
    }

    fn write_complete(&self, _id: &ArtifactId) -> Result<(), WriterError> {
        Ok(())
    }

    fn write_error(&self, _id: &ArtifactId, _cause: &FailureCause) -> Result<(), WriterError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use serde_json::json;

    #[test]
    fn write_op_replays_against_writer() {
        let id = ArtifactId::new("a1");
        let mut writer = MockArtifactWriter::new();
        writer
            .expect_write_data()
            .with(eq(id.clone()), eq(json!({ "summary": "done" })))
            .times(1)
            .returning(|_, _| Ok(()));
        writer
            .expect_write_error()
            .withf(|_, cause| matches!(cause, FailureCause::Timeout { after_ms: 10 }))
            .times(1)
            .returning(|_, _| Ok(()));

        let data = WriteOp::Data {
            id: id.clone(),
            delta: json!({ "summary": "done" }),
        };
        let error = WriteOp::Error {
            id: id.clone(),
            cause: FailureCause::Timeout { after_ms: 10 },
        };
        assert_eq!(data.name(), "data");
        assert_eq!(error.id(), &id);
        data.apply(&writer).unwrap();
        error.apply(&writer).unwrap();
    }

    #[test]
    fn arc_writer_delegates() {
        let mut writer = MockArtifactWriter::new();
        writer
            .expect_write_complete()
            .times(1)
            .returning(|_| Err(WriterError::ChannelClosed));
        let shared: Arc<dyn ArtifactWriter> = Arc::new(writer);
        assert_eq!(
            shared.write_complete(&ArtifactId::new("a1")),
            Err(WriterError::ChannelClosed)
        );
    }
}
