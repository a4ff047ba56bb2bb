//! Record-style artifacts
//!
//! Page context, evaluation and summarization are produced as whole values.
//! These helpers publish one as a single delta, stamping the capture time
//! when the producer left it at zero.

use crate::error::AggregateError;
use artifact_core::kinds::{
    Evaluation, EvaluationKind, PageContext, PageContextKind, Summarization, SummarizationKind,
};
use artifact_core::now_ms;
use artifact_stream::StreamingSession;

fn stamp(timestamp: &mut i64) {
    if *timestamp == 0 {
        *timestamp = now_ms();
    }
}

/// Publish a full page context
///
/// # Errors
/// Returns error if the session terminated
pub fn record_page_context(
    session: &StreamingSession<PageContextKind>,
    mut page: PageContext,
) -> Result<(), AggregateError> {
    stamp(&mut page.timestamp);
    Ok(session.update(page.into())?)
}

/// Publish a full evaluation
///
/// # Errors
/// Returns error if the session terminated
pub fn record_evaluation(
    session: &StreamingSession<EvaluationKind>,
    mut evaluation: Evaluation,
) -> Result<(), AggregateError> {
    stamp(&mut evaluation.timestamp);
    Ok(session.update(evaluation.into())?)
}

/// Publish a full summary
///
/// # Errors
/// Returns error if the session terminated
pub fn record_summary(
    session: &StreamingSession<SummarizationKind>,
    mut summary: Summarization,
) -> Result<(), AggregateError> {
    stamp(&mut summary.timestamp);
    Ok(session.update(summary.into())?)
}
