use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{owned_resume, ResumeDetail};
use crate::errors::AppError;
use crate::generation_client::types::DimensionScore;
use crate::models::content::{ModuleData, ModuleSection};
use crate::routes::actor::Actor;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SavedModule {
    pub module_id: i64,
    pub title: &'static str,
    /// `None` when the scorer failed or returned no dimensions.
    pub score: Option<f64>,
    pub dimensions: Vec<DimensionScore>,
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
) -> Result<Json<ResumeDetail>, AppError> {
    let row = owned_resume(&state, id, actor).await?;
    let content = state.documents.find(id).await?;
    let scores = state.repo.scores_for(id).await?;
    Ok(Json(ResumeDetail::assemble(row, content, &scores)))
}

/// PUT /api/v1/resumes/:id/modules
pub async fn handle_save_module(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<i64>,
    Json(data): Json<ModuleData>,
) -> Result<Json<SavedModule>, AppError> {
    owned_resume(&state, id, actor).await?;
    let kind = data.kind();
    let score = state
        .pipeline
        .rescore_module(id, ModuleSection::new(data))
        .await?;

    Ok(Json(SavedModule {
        module_id: kind.id(),
        title: kind.title(),
        score: score.as_ref().map(|s| s.score),
        dimensions: score.map(|s| s.dimensions).unwrap_or_default(),
    }))
}
