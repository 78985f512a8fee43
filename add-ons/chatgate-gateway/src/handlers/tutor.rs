//! Tutoring routes: list/upsert passthroughs and the guarded per-tutor chat.
//! Chat responses always render in tutor shape (`{answer, sources}`).

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use serde_json::Value;

use chatgate_core::{routes, ChatRequest, UpstreamKind};

use super::{error_response, output_format, passthrough, respond, FormatQuery};
use crate::AppState;

/// GET /tutor/tutors — list passthrough to the tutoring service.
pub(crate) async fn list(State(state): State<AppState>) -> Response {
    match state.tutor.list().await {
        Ok(envelope) => passthrough(envelope),
        Err(e) => error_response(&e),
    }
}

/// POST /tutor/tutors — upsert passthrough; the body is forwarded verbatim.
pub(crate) async fn upsert(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    match state.tutor.upsert(&body).await {
        Ok(envelope) => passthrough(envelope),
        Err(e) => error_response(&e),
    }
}

/// POST /tutor/tutors/:id/chat — guarded tutor chat.
pub(crate) async fn chat(
    State(state): State<AppState>,
    Path(tutor_id): Path<String>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
    Json(mut req): Json<ChatRequest>,
) -> Response {
    req.tutor_id = Some(tutor_id);
    let format = output_format(&query, &headers);
    let sender = req.sender_or_generated();
    tracing::info!(
        target: "chatgate::chat",
        tutor = req.tutor_id.as_deref().unwrap_or(""),
        "guarded tutor request"
    );

    let result = state
        .dispatcher
        .dispatch(routes::TUTOR_CHAT, &req)
        .await;
    respond(&state, UpstreamKind::Tutor, format, &sender, result)
}
