//! Dialogue routes: Rasa webhook forwarding, with and without the safety
//! gateway, plus the health passthrough.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;

use chatgate_core::{routes, ChatRequest, UpstreamKind};

use super::{error_response, output_format, passthrough, respond, FormatQuery};
use crate::AppState;

/// POST /rasa/chat — unguarded forward to the dialogue service.
pub(crate) async fn chat(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Response {
    let format = output_format(&query, &headers);
    let sender = req.sender_or_generated();

    let result = state
        .dispatcher
        .dispatch(routes::DIALOGUE, &req)
        .await;
    respond(&state, UpstreamKind::Dialogue, format, &sender, result)
}

/// POST /rasa/chat-safe — dialogue reply reviewed by the safety gateway
/// before it reaches the caller.
pub(crate) async fn chat_safe(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
    Json(req): Json<ChatRequest>,
) -> Response {
    let format = output_format(&query, &headers);
    let sender = req.sender_or_generated();
    tracing::info!(target: "chatgate::chat", sender = %sender, "guarded dialogue request");

    let result = state
        .dispatcher
        .dispatch(routes::DIALOGUE_GUARDED, &req)
        .await;
    respond(&state, UpstreamKind::Dialogue, format, &sender, result)
}

/// GET /rasa/status — health passthrough to the dialogue service.
pub(crate) async fn status(State(state): State<AppState>) -> Response {
    match state.dialogue.status().await {
        Ok(envelope) => passthrough(envelope),
        Err(e) => error_response(&e),
    }
}
