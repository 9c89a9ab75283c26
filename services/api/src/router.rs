//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, provider webhooks, the observer WebSocket
//! endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        AckResponse, CallRecord, CreateCallPayload, ErrorResponse, SendTextPayload,
        StatusResponse, TranscriptMetrics, TranscriptResponse, TranscriptTurn,
    },
    state::AppState,
    webhooks,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_call,
        handlers::list_calls,
        handlers::get_call,
        handlers::get_transcript,
        handlers::end_call,
        handlers::send_text,
        handlers::system_status,
    ),
    components(
        schemas(CallRecord, CreateCallPayload, SendTextPayload, TranscriptResponse, TranscriptTurn, TranscriptMetrics, StatusResponse, AckResponse, ErrorResponse)
    ),
    tags(
        (name = "Switchboard API", description = "Call management for the LLM voice agent")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    // Path parameters share the name `id` because routes under /api/calls
    // overlap; which identifier it carries is documented per handler.
    let api_router = Router::new()
        .route(
            "/api/calls",
            get(handlers::list_calls).post(handlers::create_call),
        )
        .route("/api/calls/{id}", get(handlers::get_call))
        .route("/api/calls/{id}/transcript", get(handlers::get_transcript))
        .route("/api/calls/{id}/end", post(handlers::end_call))
        .route("/api/calls/{id}/send-text", post(handlers::send_text))
        .route("/api/status", get(handlers::system_status))
        .route("/api/twilio/voice", post(webhooks::voice))
        .route("/api/twilio/gather", post(webhooks::gather))
        .route("/api/twilio/status", post(webhooks::status))
        .route("/api/ws", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
