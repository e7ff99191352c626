//! Axum routes for the chat relay and provider metadata

use axum::body::{Body, Bytes};
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::StreamExt;
use serde_json::Value;
use umbra_core::HttpError;

use crate::error::RelayError;
use crate::state::{EventStream, RelayReply, RelayState};

/// Build the relay router with the chat and provider-info endpoints
pub fn relay_router(state: RelayState) -> Router {
    let chat_path = state.chat_path().to_owned();
    let provider_info_path = state.provider_info_path().to_owned();
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes());

    Router::new()
        .route(&chat_path, routing::post(chat).layer(body_limit))
        .route(&provider_info_path, routing::get(provider_info))
        .with_state(state)
}

/// Handle `POST /api/confidential-chat`
///
/// The body is taken as raw bytes so that malformed JSON and oversized
/// bodies are reported as JSON errors rather than the framework's
/// plain-text rejection.
async fn chat(State(state): State<RelayState>, body: Result<Bytes, BytesRejection>) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            tracing::debug!(limit = state.max_body_bytes(), "chat body too large");
            return error_response(&RelayError::PayloadTooLarge(state.max_body_bytes()));
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection, "chat body could not be read");
            return error_response(&RelayError::InvalidMessages("request body could not be read".to_owned()));
        }
    };

    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "chat body is not JSON");
            return error_response(&RelayError::InvalidMessages("request body must be valid JSON".to_owned()));
        }
    };

    match state.relay(&body).await {
        Ok(RelayReply::Complete(reply)) => Json(reply).into_response(),
        Ok(RelayReply::Stream(events)) => ndjson_response(events),
        Err(e) => {
            if e.is_rejection() {
                tracing::debug!(error = %e, "chat request rejected");
            }
            error_response(&e)
        }
    }
}

/// Handle `GET /api/provider-info`
async fn provider_info(State(state): State<RelayState>) -> Response {
    (
        [(header::CACHE_CONTROL, "no-store")],
        Json(state.provider_info().clone()),
    )
        .into_response()
}

/// Write relay events as newline-delimited JSON
fn ndjson_response(events: EventStream) -> Response {
    let lines = events.map(|event| event.encode_line().map(Bytes::from));

    (
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache, no-transform"),
        ],
        Body::from_stream(lines),
    )
        .into_response()
}

/// Convert a relay error to a `{"error": ...}` JSON response
fn error_response(error: &RelayError) -> Response {
    let body = serde_json::json!({ "error": error.client_message() });
    (error.status_code(), Json(body)).into_response()
}
