//! Read and edit paths over a persisted resume.

pub mod handlers;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::content::{ModuleData, ModuleKind, ResumeContent};
use crate::models::resume::{ResumeRow, ResumeScoreRow, TargetType};
use crate::routes::actor::Actor;
use crate::state::AppState;

/// The resume row, if it exists and belongs to `actor`.
pub async fn owned_resume(state: &AppState, id: i64, actor: Actor) -> Result<ResumeRow, AppError> {
    match state.repo.find_resume(id).await? {
        Some(row) if row.user_id == actor.user_id => Ok(row),
        _ => Err(AppError::NotFound(format!("resume {id}"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DimensionView {
    pub target_id: i64,
    pub label: String,
    pub score: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleView {
    pub module_id: i64,
    pub title: &'static str,
    pub score: Option<f64>,
    pub dimensions: Vec<DimensionView>,
    pub data: Option<ModuleData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeDetail {
    pub id: i64,
    pub file_name: String,
    pub file_path: String,
    pub status: i16,
    pub total_score: f64,
    pub modules: Vec<ModuleView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeDetail {
    /// Joins the three stores' views of one resume. A module appears when it
    /// has content or a module score row.
    pub fn assemble(
        row: ResumeRow,
        content: Option<ResumeContent>,
        scores: &[ResumeScoreRow],
    ) -> Self {
        let module_score = |kind: ModuleKind| {
            scores
                .iter()
                .find(|s| s.target_type == TargetType::Module.code() && s.target_id == kind.id())
                .map(|s| s.score)
        };
        let dimensions = |kind: ModuleKind| {
            let range = kind.dimension_id_range();
            scores
                .iter()
                .filter(|s| {
                    s.target_type == TargetType::Dimension.code() && range.contains(&s.target_id)
                })
                .map(|s| DimensionView {
                    target_id: s.target_id,
                    label: s.label.clone(),
                    score: s.score,
                    weight: s.weight,
                })
                .collect::<Vec<_>>()
        };

        let modules: Vec<ModuleView> = ModuleKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let data = content
                    .as_ref()
                    .and_then(|c| c.module(kind))
                    .map(|m| m.data.clone());
                let score = module_score(kind);
                if data.is_none() && score.is_none() {
                    return None;
                }
                Some(ModuleView {
                    module_id: kind.id(),
                    title: kind.title(),
                    score,
                    dimensions: dimensions(kind),
                    data,
                })
            })
            .collect();

        let total_score = modules.iter().filter_map(|m| m.score).sum();

        Self {
            id: row.id,
            file_name: row.file_name,
            file_path: row.file_path,
            status: row.status,
            total_score,
            modules,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
