//! Dispatcher: route table and the per-request pipeline.
//!
//! Each inbound route maps statically to an upstream kind and a guarded flag,
//! resolved once at startup. Within a request the stages run strictly in
//! order: validate → upstream → normalize → (guard → sanitize)? — the renderer
//! is the caller's concern. Requests share nothing; every value built here is
//! dropped at response time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::guard::SafetyGateway;
use crate::normalize::{normalize, Candidate};
use crate::upstream::{ChatUpstream, UpstreamEnvelope};

/// One role-tagged turn of a completion-style conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

/// Inbound request body, shared by every chat route. Completion routes use
/// `messages`; dialogue and tutor routes use `message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    /// Opaque session identifier. Echoed back, never interpreted or stored.
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Turn>>,
    /// Free-form key/value, passed through to the dialogue service verbatim.
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Prior turns for tutor routes, forwarded verbatim.
    #[serde(default)]
    pub history: Option<Value>,
    /// Tutor id from the route path, not the body.
    #[serde(skip)]
    pub tutor_id: Option<String>,
    /// Caller's `Authorization` header, forwarded to the completion service.
    #[serde(skip)]
    pub auth: Option<String>,
}

impl ChatRequest {
    /// At least one of `message`/`messages` must be non-empty, or the request
    /// is rejected before any upstream call.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let has_message = self
            .message
            .as_deref()
            .is_some_and(|m| !m.trim().is_empty());
        let has_messages = self.messages.as_deref().is_some_and(|m| !m.is_empty());
        if has_message || has_messages {
            Ok(())
        } else {
            Err(GatewayError::Client(
                "request requires a non-empty `message` or `messages`".to_string(),
            ))
        }
    }

    /// The single-string message for dialogue/tutor routes, falling back to
    /// the last turn of `messages`.
    pub fn single_message(&self) -> Option<String> {
        if let Some(m) = self.message.as_deref() {
            if !m.trim().is_empty() {
                return Some(m.to_string());
            }
        }
        self.messages
            .as_deref()
            .and_then(|turns| turns.last())
            .map(|turn| turn.content.clone())
    }

    /// The turn sequence for completion routes; a bare `message` becomes a
    /// single user turn.
    pub fn turns(&self) -> Vec<Turn> {
        if let Some(turns) = &self.messages {
            return turns.clone();
        }
        match self.message.as_deref() {
            Some(m) if !m.trim().is_empty() => vec![Turn {
                role: "user".to_string(),
                content: m.to_string(),
            }],
            _ => Vec::new(),
        }
    }

    /// Caller-supplied sender, or a generated one for callers that omit it.
    pub fn sender_or_generated(&self) -> String {
        self.sender
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamKind {
    Completion,
    Dialogue,
    Tutor,
}

/// Static (upstream, guarded) pair for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteSpec {
    pub kind: UpstreamKind,
    pub guarded: bool,
}

impl RouteSpec {
    pub const fn unguarded(kind: UpstreamKind) -> Self {
        Self {
            kind,
            guarded: false,
        }
    }

    pub const fn guarded(kind: UpstreamKind) -> Self {
        Self {
            kind,
            guarded: true,
        }
    }
}

/// Static (upstream, guarded) pairs, one per chat route. No dynamic route
/// discovery; handlers reference these directly and the table ties them to
/// their paths.
pub mod routes {
    use super::{RouteSpec, UpstreamKind};

    pub const COMPLETIONS: RouteSpec = RouteSpec::unguarded(UpstreamKind::Completion);
    pub const DIALOGUE: RouteSpec = RouteSpec::unguarded(UpstreamKind::Dialogue);
    pub const DIALOGUE_GUARDED: RouteSpec = RouteSpec::guarded(UpstreamKind::Dialogue);
    pub const TUTOR_CHAT: RouteSpec = RouteSpec::guarded(UpstreamKind::Tutor);
}

/// Route table, fixed at compile time.
pub const ROUTE_TABLE: &[(&str, RouteSpec)] = &[
    ("/v1/chat/completions", routes::COMPLETIONS),
    ("/rasa/chat", routes::DIALOGUE),
    ("/rasa/chat-safe", routes::DIALOGUE_GUARDED),
    ("/tutor/tutors/:id/chat", routes::TUTOR_CHAT),
];

pub fn route_spec(path: &str) -> Option<RouteSpec> {
    ROUTE_TABLE
        .iter()
        .find(|(route, _)| *route == path)
        .map(|(_, spec)| *spec)
}

/// How one dispatched request ended. Every variant carries the status that
/// the deciding stage produced; a failure is never upgraded to 200.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// Upstream returned non-2xx; status and body pass through unchanged.
    /// On guarded routes this short-circuits before the guard is invoked.
    UpstreamError(UpstreamEnvelope),
    /// Guard reached successfully but rejected the candidate.
    GuardBlock { status: u16, reason: String },
    /// Final candidate, approved (and sanitized) when the route is guarded.
    Approved {
        envelope: UpstreamEnvelope,
        candidate: Candidate,
    },
}

/// Owns one upstream per kind plus the safety gateway. Built once at startup.
pub struct Dispatcher {
    completion: Arc<dyn ChatUpstream>,
    dialogue: Arc<dyn ChatUpstream>,
    tutor: Arc<dyn ChatUpstream>,
    guard: SafetyGateway,
}

impl Dispatcher {
    pub fn new(
        completion: Arc<dyn ChatUpstream>,
        dialogue: Arc<dyn ChatUpstream>,
        tutor: Arc<dyn ChatUpstream>,
        guard: SafetyGateway,
    ) -> Self {
        Self {
            completion,
            dialogue,
            tutor,
            guard,
        }
    }

    fn upstream(&self, kind: UpstreamKind) -> &dyn ChatUpstream {
        match kind {
            UpstreamKind::Completion => self.completion.as_ref(),
            UpstreamKind::Dialogue => self.dialogue.as_ref(),
            UpstreamKind::Tutor => self.tutor.as_ref(),
        }
    }

    /// Run the pipeline for one request.
    pub async fn dispatch(
        &self,
        spec: RouteSpec,
        req: &ChatRequest,
    ) -> Result<DispatchOutcome, GatewayError> {
        req.validate()?;

        let upstream = self.upstream(spec.kind);
        let envelope = upstream.send(req).await?;
        if !envelope.is_success() {
            tracing::info!(
                target: "chatgate::dispatch",
                status = envelope.status,
                kind = ?spec.kind,
                "upstream rejected request"
            );
            return Ok(DispatchOutcome::UpstreamError(envelope));
        }

        let mut candidate = normalize(&envelope, upstream.shape());
        if spec.guarded {
            let verdict = self.guard.review(&candidate.text).await?;
            if !verdict.accepted {
                return Ok(DispatchOutcome::GuardBlock {
                    status: verdict.status,
                    reason: verdict.reason.unwrap_or_default(),
                });
            }
            candidate.text = verdict.text.unwrap_or_default();
        }
        Ok(DispatchOutcome::Approved {
            envelope,
            candidate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_table_matches_guard_policy() {
        assert_eq!(
            route_spec("/rasa/chat"),
            Some(RouteSpec::unguarded(UpstreamKind::Dialogue))
        );
        assert!(route_spec("/rasa/chat-safe").unwrap().guarded);
        assert!(route_spec("/tutor/tutors/:id/chat").unwrap().guarded);
        assert!(!route_spec("/v1/chat/completions").unwrap().guarded);
        assert_eq!(route_spec("/nope"), None);
    }

    #[test]
    fn validate_requires_some_message() {
        let empty = ChatRequest::default();
        assert!(matches!(empty.validate(), Err(GatewayError::Client(_))));

        let blank = ChatRequest {
            message: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let ok = ChatRequest {
            message: Some("hi".to_string()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn bare_message_becomes_a_user_turn() {
        let req = ChatRequest {
            message: Some("hi".to_string()),
            ..Default::default()
        };
        let turns = req.turns();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, "user");
        assert_eq!(turns[0].content, "hi");
    }

    #[test]
    fn sender_is_echoed_or_generated() {
        let named = ChatRequest {
            sender: Some("abc".to_string()),
            ..Default::default()
        };
        assert_eq!(named.sender_or_generated(), "abc");

        let anon = ChatRequest::default();
        assert!(!anon.sender_or_generated().is_empty());
    }
}
