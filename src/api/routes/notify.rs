//! Notification Route
//!
//! Accepts object-store notifications over HTTP and enqueues them for the
//! ingestion consumer.
//!
//! - POST /api/v1/notify - Enqueue one notification envelope

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::NotifyResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

/// POST /api/v1/notify
///
/// The body is stored verbatim; envelope validation happens in the
/// consumer so a bad notification still produces an ingestion report.
pub async fn notify(
    State(state): State<Arc<AppState>>,
    body: String,
) -> ApiResult<(StatusCode, Json<NotifyResponse>)> {
    let queue = state
        .queue
        .as_ref()
        .ok_or_else(|| ApiError::ServiceUnavailable("ingestion is disabled".to_string()))?;
    let message_id = queue.push(body)?;
    Ok((StatusCode::ACCEPTED, Json(NotifyResponse { message_id })))
}
