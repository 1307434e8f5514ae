use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use serde::Deserialize;

use super::service::{SubmittedTask, TaskView, UploadedFile, MAX_UPLOAD_BYTES};
use crate::errors::AppError;
use crate::generation_client::builder::QuestionAnswer;
use crate::routes::actor::Actor;
use crate::state::AppState;

/// Request body ceiling for uploads: the file limit plus multipart framing.
/// Anything between the two is rejected by validation with a readable message.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

const FILE_FIELD: &str = "file";

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub questions: Vec<QuestionAnswer>,
}

/// POST /api/v1/resumes/generate
pub async fn handle_generate(
    State(state): State<AppState>,
    actor: Actor,
    Json(body): Json<GenerateBody>,
) -> Result<Json<SubmittedTask>, AppError> {
    let submitted = state.tasks.submit_generation(&body.questions, actor).await?;
    Ok(Json(submitted))
}

/// POST /api/v1/resumes/upload (multipart, field `file`)
pub async fn handle_upload(
    State(state): State<AppState>,
    actor: Actor,
    mut multipart: Multipart,
) -> Result<Json<SubmittedTask>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("failed to read uploaded file: {e}")))?;
        upload = Some(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }

    let file = upload.ok_or_else(|| AppError::Validation("missing 'file' field".into()))?;
    let submitted = state.tasks.submit_upload(file, actor).await?;
    Ok(Json(submitted))
}

/// GET /api/v1/resumes/tasks/:task_id
pub async fn handle_task_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(task_id): Path<String>,
) -> Result<Json<TaskView>, AppError> {
    Ok(Json(state.tasks.status(&task_id, actor).await?))
}
