//! Thin HTTP clients for the three conversational backends.
//!
//! All three return an [`UpstreamEnvelope`] and never treat a non-2xx upstream
//! status as a local error — that status is carried through to the caller.
//! Only genuine transport failure (DNS, connect, timeout) becomes
//! [`GatewayError::Transport`].

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde_json::Value;
use std::time::Duration;

use crate::dispatch::ChatRequest;
use crate::error::GatewayError;
use crate::normalize::Shape;

/// Shared HTTP client with a per-call timeout. Builder failure is a startup
/// error; callers must not fall back to an unbounded client.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Best-effort parse of an upstream body. The raw text is always kept so a
/// non-JSON body can still be surfaced verbatim.
#[derive(Debug, Clone)]
pub enum ParsedBody {
    Json(Value),
    Raw,
}

/// Raw result of one upstream call: status, body text, and a best-effort
/// parsed JSON value. Lives only for the duration of one request.
#[derive(Debug, Clone)]
pub struct UpstreamEnvelope {
    pub status: u16,
    pub raw: String,
    pub parsed: ParsedBody,
    /// Upstream `Content-Type`, echoed on passthrough routes.
    pub content_type: Option<String>,
}

impl UpstreamEnvelope {
    /// Drain a reqwest response into an envelope. Body-read failure counts as
    /// transport failure (the connection died mid-response).
    pub async fn from_response(res: reqwest::Response) -> Result<Self, GatewayError> {
        let status = res.status().as_u16();
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let raw = res.text().await.map_err(GatewayError::from)?;
        let parsed = match serde_json::from_str::<Value>(&raw) {
            Ok(v) => ParsedBody::Json(v),
            Err(_) => ParsedBody::Raw,
        };
        Ok(Self {
            status,
            raw,
            parsed,
            content_type,
        })
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<&Value> {
        match &self.parsed {
            ParsedBody::Json(v) => Some(v),
            ParsedBody::Raw => None,
        }
    }

    #[cfg(test)]
    pub fn test_json(status: u16, body: Value) -> Self {
        Self {
            status,
            raw: body.to_string(),
            parsed: ParsedBody::Json(body),
            content_type: Some("application/json".to_string()),
        }
    }

    #[cfg(test)]
    pub fn test_raw(status: u16, body: &str) -> Self {
        Self {
            status,
            raw: body.to_string(),
            parsed: ParsedBody::Raw,
            content_type: Some("text/plain".to_string()),
        }
    }
}

/// Seam between the dispatcher and a backend. Production impls are the three
/// clients below; tests substitute call-counting doubles.
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    /// Which normalization rule applies to this backend's replies.
    fn shape(&self) -> Shape;

    async fn send(&self, req: &ChatRequest) -> Result<UpstreamEnvelope, GatewayError>;
}

/// Client for the completion capability. The guard endpoint lives on the same
/// base, so this client also fronts `/v1/chat/safe`.
pub struct CompletionClient {
    http: reqwest::Client,
    base: String,
}

impl CompletionClient {
    pub fn new(http: reqwest::Client, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    async fn post_messages(
        &self,
        suffix: &str,
        req: &ChatRequest,
    ) -> Result<UpstreamEnvelope, GatewayError> {
        let url = format!("{}{}", self.base, suffix);
        let body = serde_json::json!({ "messages": req.turns() });
        let mut call = self.http.post(&url).json(&body);
        if let Some(token) = req.auth.as_deref() {
            call = call.header(AUTHORIZATION, token);
        }
        let res = call.send().await.map_err(GatewayError::from)?;
        UpstreamEnvelope::from_response(res).await
    }

    /// POST `{base}/v1/chat/completions`.
    pub async fn chat(&self, req: &ChatRequest) -> Result<UpstreamEnvelope, GatewayError> {
        self.post_messages("/v1/chat/completions", req).await
    }

    /// POST `{base}/v1/chat/safe` — passthrough to the guard capability.
    pub async fn safe_chat(&self, req: &ChatRequest) -> Result<UpstreamEnvelope, GatewayError> {
        self.post_messages("/v1/chat/safe", req).await
    }
}

#[async_trait]
impl ChatUpstream for CompletionClient {
    fn shape(&self) -> Shape {
        Shape::Completion
    }

    async fn send(&self, req: &ChatRequest) -> Result<UpstreamEnvelope, GatewayError> {
        self.chat(req).await
    }
}

/// Client for the dialogue engine's REST webhook. Replies arrive as an ordered
/// array of bubbles, not a single string.
pub struct DialogueClient {
    http: reqwest::Client,
    base: String,
}

impl DialogueClient {
    pub fn new(http: reqwest::Client, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub async fn chat(
        &self,
        sender: &str,
        message: &str,
        metadata: Option<&Value>,
    ) -> Result<UpstreamEnvelope, GatewayError> {
        let url = format!("{}/webhooks/rest/webhook", self.base);
        let mut body = serde_json::json!({ "sender": sender, "message": message });
        if let Some(meta) = metadata {
            body["metadata"] = meta.clone();
        }
        let res = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::from)?;
        UpstreamEnvelope::from_response(res).await
    }

    /// GET `{base}/status` — health passthrough.
    pub async fn status(&self) -> Result<UpstreamEnvelope, GatewayError> {
        let url = format!("{}/status", self.base);
        let res = self.http.get(&url).send().await.map_err(GatewayError::from)?;
        UpstreamEnvelope::from_response(res).await
    }
}

#[async_trait]
impl ChatUpstream for DialogueClient {
    fn shape(&self) -> Shape {
        Shape::Dialogue
    }

    async fn send(&self, req: &ChatRequest) -> Result<UpstreamEnvelope, GatewayError> {
        let sender = req.sender_or_generated();
        let message = req.single_message().unwrap_or_default();
        self.chat(&sender, &message, req.metadata.as_ref()).await
    }
}

/// Client for the retrieval-augmented tutoring service.
pub struct TutorClient {
    http: reqwest::Client,
    base: String,
    chat_suffix: String,
}

impl TutorClient {
    pub fn new(http: reqwest::Client, base: &str, chat_suffix: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            chat_suffix: chat_suffix.to_string(),
        }
    }

    pub async fn chat(
        &self,
        tutor_id: &str,
        message: &str,
        history: Option<&Value>,
    ) -> Result<UpstreamEnvelope, GatewayError> {
        let url = format!("{}/tutors/{}{}", self.base, tutor_id, self.chat_suffix);
        let mut body = serde_json::json!({ "message": message });
        if let Some(h) = history {
            body["history"] = h.clone();
        }
        let res = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::from)?;
        UpstreamEnvelope::from_response(res).await
    }

    /// GET `{base}/tutors` — list passthrough.
    pub async fn list(&self) -> Result<UpstreamEnvelope, GatewayError> {
        let url = format!("{}/tutors", self.base);
        let res = self.http.get(&url).send().await.map_err(GatewayError::from)?;
        UpstreamEnvelope::from_response(res).await
    }

    /// POST `{base}/tutors` — upsert passthrough; the body is forwarded verbatim.
    pub async fn upsert(&self, body: &Value) -> Result<UpstreamEnvelope, GatewayError> {
        let url = format!("{}/tutors", self.base);
        let res = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(GatewayError::from)?;
        UpstreamEnvelope::from_response(res).await
    }
}

#[async_trait]
impl ChatUpstream for TutorClient {
    fn shape(&self) -> Shape {
        Shape::Tutor
    }

    async fn send(&self, req: &ChatRequest) -> Result<UpstreamEnvelope, GatewayError> {
        let tutor_id = req
            .tutor_id
            .as_deref()
            .ok_or_else(|| GatewayError::Client("missing tutor id".to_string()))?;
        let message = req.single_message().unwrap_or_default();
        self.chat(tutor_id, &message, req.history.as_ref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_client_builds_with_timeout() {
        assert!(http_client(Duration::from_secs(5)).is_ok());
    }
}
