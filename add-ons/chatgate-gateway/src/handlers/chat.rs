//! Completion routes: `/v1/chat/completions` and the guard capability
//! passthrough `/v1/chat/safe`. Both forward the caller's `Authorization`
//! header so the key never has to live in this process.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;

use chatgate_core::{normalize, routes, ChatRequest, DispatchOutcome, Shape, UpstreamKind};

use super::{auth_header, output_format, respond, FormatQuery};
use crate::AppState;

/// POST /v1/chat/completions — unguarded forward to the completion service.
pub(crate) async fn completions(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
    Json(mut req): Json<ChatRequest>,
) -> Response {
    req.auth = auth_header(&headers);
    let format = output_format(&query, &headers);
    let sender = req.sender_or_generated();
    tracing::info!(target: "chatgate::chat", turns = req.turns().len(), "completion request");

    let result = state
        .dispatcher
        .dispatch(routes::COMPLETIONS, &req)
        .await;
    respond(&state, UpstreamKind::Completion, format, &sender, result)
}

/// POST /v1/chat/safe — passthrough to the guard capability's own endpoint.
/// Not itself guarded; the internal safety gateway calls the same upstream.
pub(crate) async fn safe(
    State(state): State<AppState>,
    Query(query): Query<FormatQuery>,
    headers: HeaderMap,
    Json(mut req): Json<ChatRequest>,
) -> Response {
    req.auth = auth_header(&headers);
    let format = output_format(&query, &headers);
    let sender = req.sender_or_generated();

    let result = match req.validate() {
        Err(e) => Err(e),
        Ok(()) => match state.completion.safe_chat(&req).await {
            Err(e) => Err(e),
            Ok(envelope) if !envelope.is_success() => {
                Ok(DispatchOutcome::UpstreamError(envelope))
            }
            Ok(envelope) => {
                let candidate = normalize(&envelope, Shape::Completion);
                Ok(DispatchOutcome::Approved {
                    envelope,
                    candidate,
                })
            }
        },
    };
    respond(&state, UpstreamKind::Completion, format, &sender, result)
}
