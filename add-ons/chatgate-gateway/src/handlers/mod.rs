//! Route handlers: thin HTTP wrappers over the core dispatch pipeline.
//!
//! The shared pieces live here — content negotiation, the outcome-to-response
//! mapping, and upstream passthrough. The status code of the final response
//! always matches whichever stage (upstream, guard) decided the outcome.

pub mod chat;
pub mod rasa;
pub mod tutor;

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use chatgate_core::{
    negotiate, render, DispatchOutcome, GatewayError, OutputFormat, ParsedBody, UpstreamEnvelope,
    UpstreamKind,
};

use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FormatQuery {
    #[serde(default)]
    pub format: Option<String>,
}

pub(crate) fn output_format(query: &FormatQuery, headers: &HeaderMap) -> OutputFormat {
    let accept = headers.get(header::ACCEPT).and_then(|v| v.to_str().ok());
    negotiate(query.format.as_deref(), accept)
}

pub(crate) fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn status_of(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY)
}

pub(crate) fn error_response(e: &GatewayError) -> Response {
    (
        status_of(e.status()),
        Json(json!({ "error": e.tag(), "detail": e.to_string() })),
    )
        .into_response()
}

/// Echo an upstream envelope unchanged: status, body, and content type.
pub(crate) fn passthrough(envelope: UpstreamEnvelope) -> Response {
    let content_type = envelope.content_type.clone().unwrap_or_else(|| {
        match envelope.parsed {
            ParsedBody::Json(_) => "application/json",
            ParsedBody::Raw => "text/plain; charset=utf-8",
        }
        .to_string()
    });
    (
        status_of(envelope.status),
        [(header::CONTENT_TYPE, content_type)],
        envelope.raw,
    )
        .into_response()
}

/// Map a dispatch outcome to the final response for one route.
pub(crate) fn respond(
    state: &AppState,
    kind: UpstreamKind,
    format: OutputFormat,
    sender: &str,
    result: Result<DispatchOutcome, GatewayError>,
) -> Response {
    match result {
        Err(e) => error_response(&e),
        Ok(DispatchOutcome::UpstreamError(envelope)) => passthrough(envelope),
        Ok(DispatchOutcome::GuardBlock { status, reason }) => (
            status_of(status),
            Json(json!({ "error": "guard_block", "detail": reason })),
        )
            .into_response(),
        Ok(DispatchOutcome::Approved {
            envelope,
            candidate,
        }) => match format {
            OutputFormat::Html => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                render::html_document(&candidate, &state.config.sources_mount),
            )
                .into_response(),
            OutputFormat::Json => (
                StatusCode::OK,
                Json(render::json_body(kind, &envelope, &candidate, sender)),
            )
                .into_response(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_state;
    use chatgate_core::{Candidate, GatewayConfig, SourceRef};

    fn state() -> AppState {
        build_state(GatewayConfig::default()).expect("state")
    }

    async fn body_string(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn guard_block_keeps_the_guard_status_and_reason() {
        let res = respond(
            &state(),
            UpstreamKind::Dialogue,
            OutputFormat::Json,
            "s1",
            Ok(DispatchOutcome::GuardBlock {
                status: 422,
                reason: "policy".to_string(),
            }),
        );
        assert_eq!(res.status().as_u16(), 422);
        let body: serde_json::Value = serde_json::from_str(&body_string(res).await).unwrap();
        assert_eq!(body, json!({"error": "guard_block", "detail": "policy"}));
    }

    #[tokio::test]
    async fn tutor_html_rendering_links_sources_with_display_page() {
        let envelope = UpstreamEnvelope {
            status: 200,
            raw: String::new(),
            parsed: ParsedBody::Raw,
            content_type: None,
        };
        let candidate = Candidate {
            text: "see the notes".to_string(),
            sources: vec![SourceRef {
                source: "a/b.pdf".to_string(),
                page_index: Some(2),
                chunk_index: None,
                score: None,
            }],
        };
        let res = respond(
            &state(),
            UpstreamKind::Tutor,
            OutputFormat::Html,
            "s1",
            Ok(DispatchOutcome::Approved {
                envelope,
                candidate,
            }),
        );
        assert_eq!(res.status().as_u16(), 200);
        let body = body_string(res).await;
        assert!(body.contains("href=\"/static/sources/a/b.pdf\""));
        assert!(body.contains("page 3"));
    }

    #[tokio::test]
    async fn upstream_error_passes_status_and_body_through() {
        let envelope = UpstreamEnvelope {
            status: 503,
            raw: "engine warming up".to_string(),
            parsed: ParsedBody::Raw,
            content_type: Some("text/plain".to_string()),
        };
        let res = respond(
            &state(),
            UpstreamKind::Dialogue,
            OutputFormat::Json,
            "s1",
            Ok(DispatchOutcome::UpstreamError(envelope)),
        );
        assert_eq!(res.status().as_u16(), 503);
        assert_eq!(body_string(res).await, "engine warming up");
    }
}
