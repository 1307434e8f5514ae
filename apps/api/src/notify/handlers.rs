use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::warn;

use super::PayNotification;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/v1/slots/pay-notify
///
/// Always answers 200 so the notifier reads `success` instead of retrying on
/// transport status; a `false` there asks for redelivery. Bodies that do not
/// decode are answered the same way.
pub async fn handle_pay_notify(
    State(state): State<AppState>,
    payload: Result<Json<PayNotification>, JsonRejection>,
) -> (StatusCode, Json<NotifyResponse>) {
    let notification = match payload {
        Ok(Json(notification)) => notification,
        Err(rejection) => {
            warn!("Rejected pay notification body: {rejection}");
            return reply(false, format!("invalid request body: {}", rejection.body_text()));
        }
    };

    let outcome = state.notify.handle(&notification).await;
    reply(outcome.is_success(), outcome.message())
}

fn reply(success: bool, message: String) -> (StatusCode, Json<NotifyResponse>) {
    (StatusCode::OK, Json(NotifyResponse { success, message }))
}
