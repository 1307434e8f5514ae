use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::AppError;

const USER_HEADER: &str = "x-user-id";
const TENANT_HEADER: &str = "x-tenant-id";

/// Authenticated caller, as forwarded by the gateway in request headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub tenant_id: i64,
}

fn header_id(parts: &Parts, name: &str) -> Result<i64, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|id| *id > 0)
        .ok_or(AppError::Unauthorized)
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Actor {
            user_id: header_id(parts, USER_HEADER)?,
            tenant_id: header_id(parts, TENANT_HEADER)?,
        })
    }
}
