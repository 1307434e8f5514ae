use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::metrics;
use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "cvgen"
    }))
}

/// GET /metrics
/// Prometheus text exposition of the service metrics.
pub async fn metrics_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let body = metrics::render(&state.metrics).map_err(anyhow::Error::from)?;
    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
