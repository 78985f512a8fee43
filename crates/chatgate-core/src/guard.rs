//! Safety gateway: second-pass review of every candidate on guarded routes.
//!
//! The candidate is wrapped in a fixed two-turn prompt and sent to the guard
//! capability at `{llm_base}/v1/chat/safe`. Guard replies speak the
//! completion-response dialect, so extraction reuses the completion rule from
//! the normalizer. The guard step never runs for unguarded routes.

use serde_json::Value;

use crate::error::GatewayError;
use crate::normalize::completion_text;
use crate::sanitize::sanitize;
use crate::upstream::UpstreamEnvelope;

const GUARD_SYSTEM_PROMPT: &str = "You are a safety reviewer. If the candidate text below is safe \
and compliant, return it verbatim. Otherwise refuse and reply with a brief safe alternative.";

/// Low temperature keeps the verbatim-echo behavior deterministic.
const GUARD_TEMPERATURE: f32 = 0.0;
const GUARD_MAX_TOKENS: u32 = 512;

/// Outcome of one guard review. Exactly one of `text`/`reason` is populated.
#[derive(Debug, Clone)]
pub struct GuardVerdict {
    pub accepted: bool,
    /// Sanitized final string; present only when accepted.
    pub text: Option<String>,
    /// Rejection reason; present only when rejected.
    pub reason: Option<String>,
    /// HTTP status of the guard call, propagated to the caller on rejection.
    pub status: u16,
}

pub struct SafetyGateway {
    http: reqwest::Client,
    base: String,
}

impl SafetyGateway {
    pub fn new(http: reqwest::Client, llm_base: &str) -> Self {
        Self {
            http,
            base: llm_base.trim_end_matches('/').to_string(),
        }
    }

    /// Review one candidate string. Transport failure of the guard call is a
    /// 502 condition for the whole request, not a rejection.
    pub async fn review(&self, candidate: &str) -> Result<GuardVerdict, GatewayError> {
        let url = format!("{}/v1/chat/safe", self.base);
        let body = serde_json::json!({
            "messages": [
                { "role": "system", "content": GUARD_SYSTEM_PROMPT },
                { "role": "user", "content": format!("candidate:\n{candidate}") },
            ],
            "temperature": GUARD_TEMPERATURE,
            "max_tokens": GUARD_MAX_TOKENS,
        });
        let res = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::from)?;
        let envelope = UpstreamEnvelope::from_response(res).await?;
        let verdict = interpret(&envelope);
        if !verdict.accepted {
            tracing::info!(
                target: "chatgate::guard",
                status = envelope.status,
                "guard rejected candidate"
            );
        }
        Ok(verdict)
    }
}

/// Turn a guard envelope into a verdict. Split out from the network call so
/// the rejection fallback chain is testable without a live guard.
pub fn interpret(envelope: &UpstreamEnvelope) -> GuardVerdict {
    if !envelope.is_success() {
        return GuardVerdict {
            accepted: false,
            text: None,
            reason: Some(rejection_reason(envelope)),
            status: envelope.status,
        };
    }
    let raw = envelope
        .json()
        .and_then(completion_text)
        .unwrap_or_else(|| envelope.raw.clone());
    GuardVerdict {
        accepted: true,
        text: Some(sanitize(&raw)),
        reason: None,
        status: envelope.status,
    }
}

/// Priority order: guard's structured `detail.reason`, then a string `detail`,
/// then the raw guard body, then a synthesized `HTTP <status>`.
fn rejection_reason(envelope: &UpstreamEnvelope) -> String {
    if let Some(json) = envelope.json() {
        if let Some(reason) = json
            .get("detail")
            .and_then(|d| d.get("reason"))
            .and_then(Value::as_str)
        {
            return reason.to_string();
        }
        if let Some(detail) = json.get("detail").and_then(Value::as_str) {
            return detail.to_string();
        }
    }
    if !envelope.raw.trim().is_empty() {
        return envelope.raw.clone();
    }
    format!("HTTP {}", envelope.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_2xx_with_structured_reason() {
        let env = UpstreamEnvelope::test_json(422, json!({"detail": {"reason": "policy"}}));
        let verdict = interpret(&env);
        assert!(!verdict.accepted);
        assert_eq!(verdict.status, 422);
        assert_eq!(verdict.reason.as_deref(), Some("policy"));
        assert!(verdict.text.is_none());
    }

    #[test]
    fn non_2xx_falls_back_to_string_detail_then_raw_then_status() {
        let env = UpstreamEnvelope::test_json(403, json!({"detail": "blocked"}));
        assert_eq!(interpret(&env).reason.as_deref(), Some("blocked"));

        let env = UpstreamEnvelope::test_raw(500, "guard exploded");
        assert_eq!(interpret(&env).reason.as_deref(), Some("guard exploded"));

        let env = UpstreamEnvelope::test_raw(503, "");
        assert_eq!(interpret(&env).reason.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn accepted_output_is_sanitized() {
        let env = UpstreamEnvelope::test_json(
            200,
            json!({"choices": [{"message": {"content": "VERBATIM: \"hello\""}}]}),
        );
        let verdict = interpret(&env);
        assert!(verdict.accepted);
        assert_eq!(verdict.text.as_deref(), Some("hello"));
        assert!(verdict.reason.is_none());
    }

    #[test]
    fn accepted_non_json_guard_body_passes_through_sanitized() {
        let env = UpstreamEnvelope::test_raw(200, "  plain approval  ");
        let verdict = interpret(&env);
        assert!(verdict.accepted);
        assert_eq!(verdict.text.as_deref(), Some("plain approval"));
    }
}
