pub mod actor;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::notify::handlers as notify;
use crate::relay::handlers as relay;
use crate::resumes::handlers as resumes;
use crate::state::AppState;
use crate::tasks::handlers as tasks;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/metrics", get(health::metrics_handler))
        // Asynchronous resume creation
        .route("/api/v1/resumes/generate", post(tasks::handle_generate))
        .route(
            "/api/v1/resumes/upload",
            post(tasks::handle_upload).layer(DefaultBodyLimit::max(tasks::UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/v1/resumes/tasks/:task_id",
            get(tasks::handle_task_status),
        )
        // Persisted resumes
        .route("/api/v1/resumes/:id", get(resumes::handle_get_resume))
        .route(
            "/api/v1/resumes/:id/modules",
            put(resumes::handle_save_module),
        )
        .route("/api/v1/resumes/:id/ai-write", post(relay::handle_ai_write))
        // Payment callbacks
        .route("/api/v1/slots/pay-notify", post(notify::handle_pay_notify))
        .with_state(state)
}
