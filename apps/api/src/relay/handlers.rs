use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;

use super::RelayOutcome;
use crate::errors::AppError;
use crate::generation_client::types::WriteRequest;
use crate::models::content::{ModuleKind, ResumeData};
use crate::resumes::owned_resume;
use crate::routes::actor::Actor;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AiWriteRequest {
    pub module_id: i64,
    #[serde(default)]
    pub info: String,
}

/// POST /api/v1/resumes/:id/ai-write
///
/// One SSE `data:` event per forwarded unit, JSON-encoded. An `error` event
/// closes the stream when the upstream failed or hit its ceiling.
pub async fn handle_ai_write(
    State(state): State<AppState>,
    actor: Actor,
    Path(resume_id): Path<i64>,
    Json(req): Json<AiWriteRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let kind = ModuleKind::from_id(req.module_id)
        .ok_or_else(|| AppError::Validation(format!("unknown module id {}", req.module_id)))?;
    owned_resume(&state, resume_id, actor).await?;
    let content = state
        .documents
        .find(resume_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("content of resume {resume_id}")))?;

    let request = WriteRequest {
        resume: ResumeData::from_sections(&content.modules, Some(kind)),
        requirement: state.scoring.rules().requirement(kind),
        info: req.info,
    };
    info!(resume_id, module = kind.title(), "Opening write stream");

    let (units, outcome) = state.relay.open(request);
    let events = ReceiverStream::new(units).map(|unit| Event::default().json_data(unit));
    let tail = stream::once(async move {
        match outcome.await {
            Ok(RelayOutcome::TimedOut) => Some(error_event("upstream timed out")),
            Ok(RelayOutcome::Failed(reason)) => Some(error_event(&reason)),
            Ok(_) => None,
            Err(e) => Some(error_event(&format!("relay aborted: {e}"))),
        }
    })
    .filter_map(|event| async move { event.map(Ok::<_, axum::Error>) });

    Ok(Sse::new(events.chain(tail)).keep_alive(KeepAlive::default()))
}

fn error_event(message: &str) -> Event {
    // `Event::data` rejects carriage returns.
    Event::default().event("error").data(message.replace('\r', " "))
}
