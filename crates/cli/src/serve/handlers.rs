//! HTTP route handlers: health and the session lifecycle.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use taxwise_core::FINANCIAL_YEAR;
use taxwise_engine::EngineError;
use taxwise_storage::StorageError;
use tracing::{error, info};

use super::json_error;
use super::state::AppState;
use crate::commands::outcome_json;

/// Map an engine error to a status code and a JSON error body.
fn engine_error(err: EngineError) -> Response {
    let status = match &err {
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        e if e.is_integrity_failure() => StatusCode::CONFLICT,
        EngineError::Storage(StorageError::VersionConflict { .. }) => StatusCode::CONFLICT,
        EngineError::Storage(StorageError::InvalidSessionId { .. }) | EngineError::Core(_) => {
            StatusCode::BAD_REQUEST
        }
        EngineError::Generation(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %err, "request failed");
    }
    json_error(status, &err.to_string()).into_response()
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "financial_year": FINANCIAL_YEAR,
    });
    (StatusCode::OK, Json(response))
}

/// POST /sessions -- body is the user's initial details object.
pub(crate) async fn handle_start(
    State(state): State<Arc<AppState>>,
    Json(details): Json<Value>,
) -> Response {
    if !details.is_object() {
        return json_error(StatusCode::BAD_REQUEST, "request body must be a JSON object")
            .into_response();
    }
    match state.sessions.start(details).await {
        Ok((session_id, outcome)) => {
            info!(session_id = %session_id, "session created over HTTP");
            (StatusCode::CREATED, Json(outcome_json(&session_id, &outcome))).into_response()
        }
        Err(e) => engine_error(e),
    }
}

#[derive(Deserialize)]
pub(crate) struct ReplyBody {
    request_id: String,
    message: String,
}

/// POST /sessions/{id}/reply
pub(crate) async fn handle_reply(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let body: ReplyBody = match serde_json::from_value(body) {
        Ok(b) => b,
        Err(e) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                &format!("expected {{\"request_id\", \"message\"}}: {e}"),
            )
            .into_response()
        }
    };
    match state
        .sessions
        .reply(&id, &body.request_id, &body.message)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome_json(&id, &outcome))).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /sessions/{id}
pub(crate) async fn handle_get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.sessions.get(&id).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => engine_error(e),
    }
}

/// POST /sessions/{id}/chat -- body `{"message": "..."}`.
pub(crate) async fn handle_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let message = match body.get("message").and_then(|v| v.as_str()) {
        Some(m) => m.to_string(),
        None => {
            return json_error(StatusCode::BAD_REQUEST, "missing 'message' field").into_response()
        }
    };
    match state.sessions.chat(&id, &message).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(json!({ "session_id": id, "reply": reply })),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}

/// DELETE /sessions/{id} -- cancels a session waiting for input.
pub(crate) async fn handle_cancel(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.sessions.cancel(&id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "session_id": id, "status": "cancelled" })),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}
