//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for call
//! management. It uses `utoipa` doc comments to generate OpenAPI
//! documentation. Webhook endpoints hit by the telephony provider live in
//! `webhooks`, not here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    models::{
        AckResponse, CallRecord, CreateCallPayload, ErrorResponse, SendTextPayload,
        StatusResponse, TranscriptMetrics, TranscriptResponse, TranscriptTurn,
    },
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Place an outbound call to a phone number.
#[utoipa::path(
    post,
    path = "/api/calls",
    request_body = CreateCallPayload,
    responses(
        (status = 201, description = "Call placed successfully", body = CallRecord),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_call(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCallPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload.validate().map_err(ApiError::BadRequest)?;

    let record = state
        .db
        .create_call(&payload.phone_number, payload.message.as_deref(), "initiating")
        .await?;

    let placement = match state.gateway.place_call(&payload.phone_number).await {
        Ok(placement) => placement,
        Err(error) => {
            state.db.update_call_status(record.id, "failed", None).await?;
            return Err(error.into());
        }
    };
    info!(call_sid = %placement.sid, phone_number = %payload.phone_number, "outbound call placed");

    let updated = state
        .db
        .set_call_sid(record.id, &placement.sid, &placement.status)
        .await?;

    Ok((StatusCode::CREATED, Json(updated)))
}

/// List all recorded calls.
#[utoipa::path(
    get,
    path = "/api/calls",
    responses(
        (status = 200, description = "List of calls", body = [CallRecord]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_calls(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<CallRecord>>, ApiError> {
    let calls = state.db.list_calls().await?;
    Ok(Json(calls))
}

/// Get a specific call record by its ID.
#[utoipa::path(
    get,
    path = "/api/calls/{id}",
    responses(
        (status = 200, description = "Call details", body = CallRecord),
        (status = 404, description = "Call not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Call record ID")
    )
)]
pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let call = state
        .db
        .get_call(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Call with id '{}' not found", id)))?;

    Ok((StatusCode::OK, Json(call)))
}

/// Get the live transcript of a call.
///
/// Returns an empty transcript for call sids with no live session, so the
/// dashboard can poll before the call connects and after it ends.
#[utoipa::path(
    get,
    path = "/api/calls/{id}/transcript",
    responses(
        (status = 200, description = "Current transcript and metrics", body = TranscriptResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Telephony provider call SID")
    )
)]
pub async fn get_transcript(
    State(state): State<Arc<AppState>>,
    Path(call_sid): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let snapshot = state.lifecycle.transcript(&call_sid).await;

    let transcript: Vec<TranscriptTurn> =
        snapshot.turns.into_iter().map(TranscriptTurn::from).collect();
    let metrics = TranscriptMetrics::from_turns(&transcript, snapshot.elapsed_seconds);

    Ok(Json(TranscriptResponse {
        call_id: call_sid,
        transcript,
        turn_count: snapshot.turn_count,
        duration: snapshot.elapsed_seconds,
        metrics,
    }))
}

/// End an active call.
#[utoipa::path(
    post,
    path = "/api/calls/{id}/end",
    responses(
        (status = 200, description = "Call ended", body = AckResponse),
        (status = 404, description = "Call not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Telephony provider call SID")
    )
)]
pub async fn end_call(
    State(state): State<Arc<AppState>>,
    Path(call_sid): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Discard the conversation and notify observers first; the bookkeeping
    // below is best-effort.
    state.lifecycle.end_call(&call_sid);

    if let Err(error) = state.gateway.complete_call(&call_sid).await {
        warn!(call_sid = %call_sid, %error, "provider hangup request failed");
    }

    let record = state
        .db
        .get_call_by_sid(&call_sid)
        .await?
        .ok_or_else(|| ApiError::NotFound("Call not found".to_string()))?;
    state.db.update_call_status(record.id, "completed", None).await?;

    Ok(Json(AckResponse {
        message: "Call ended successfully".to_string(),
    }))
}

/// Queue text for the agent to speak on its next turn.
#[utoipa::path(
    post,
    path = "/api/calls/{id}/send-text",
    request_body = SendTextPayload,
    responses(
        (status = 200, description = "Text queued", body = AckResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Telephony provider call SID")
    )
)]
pub async fn send_text(
    State(state): State<Arc<AppState>>,
    Path(call_sid): Path<String>,
    Json(payload): Json<SendTextPayload>,
) -> Result<Json<AckResponse>, ApiError> {
    if payload.message.trim().is_empty() {
        return Err(ApiError::BadRequest("Message is required".to_string()));
    }

    state.lifecycle.inject_reply(&call_sid, &payload.message).await;

    Ok(Json(AckResponse {
        message: "Text sent successfully".to_string(),
    }))
}

/// Report connectivity of the service's dependencies.
#[utoipa::path(
    get,
    path = "/api/status",
    responses(
        (status = 200, description = "Dependency status", body = StatusResponse)
    )
)]
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let postgres = match state.db.ping().await {
        Ok(()) => "connected",
        Err(error) => {
            warn!(%error, "database ping failed");
            "error"
        }
    };

    // Only the database gets probed. The providers are exercised by real
    // traffic, and the webhook can only be confirmed by Twilio reaching us.
    Json(StatusResponse {
        twilio: "connected".to_string(),
        openai: "connected".to_string(),
        postgres: postgres.to_string(),
        webhook: "pending".to_string(),
    })
}
