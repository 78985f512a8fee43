//! Response normalizer: one candidate string out of any upstream shape.
//!
//! Fallback policy: a successful upstream call never yields an empty candidate
//! silently. If no known field matches, the stringified body is used; if JSON
//! parsing failed, the raw body text is passed through as-is.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::upstream::UpstreamEnvelope;

/// Which backend dialect an envelope speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Completion,
    Dialogue,
    Tutor,
}

/// Citation into a retrieval source document/chunk. Carried verbatim from the
/// tutoring service; `page_index` is 0-indexed on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRef {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Normalized single-string extraction from an upstream response, pre-guard.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

impl Candidate {
    fn bare(text: String) -> Self {
        Self {
            text,
            sources: Vec::new(),
        }
    }
}

static NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{2,}").unwrap());

/// Derive a [`Candidate`] from an envelope. Parse failure for any shape
/// degrades to passing the raw upstream text through rather than erroring.
pub fn normalize(envelope: &UpstreamEnvelope, shape: Shape) -> Candidate {
    let json = match envelope.json() {
        Some(v) => v,
        None => return Candidate::bare(envelope.raw.clone()),
    };
    match shape {
        Shape::Completion => Candidate::bare(
            completion_text(json).unwrap_or_else(|| stringify(json, &envelope.raw)),
        ),
        Shape::Dialogue => Candidate::bare(dialogue_text(json)),
        Shape::Tutor => tutor_candidate(json, &envelope.raw),
    }
}

/// Completion-dialect extraction, in priority order:
/// `choices[0].message.content`, `choices[0].text`, `result[0].content`.
/// The guard capability speaks this dialect too, so the safety gateway reuses
/// this rule on guard replies.
pub fn completion_text(json: &Value) -> Option<String> {
    let first_choice = json.get("choices").and_then(|c| c.get(0));
    if let Some(content) = first_choice
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
    {
        return Some(content.to_string());
    }
    if let Some(text) = first_choice.and_then(|c| c.get("text")).and_then(Value::as_str) {
        return Some(text.to_string());
    }
    json.get("result")
        .and_then(|r| r.get(0))
        .and_then(|r| r.get("content"))
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Join bubble payloads with single newlines, dropping empty ones. Bubble
/// arrays frequently contain blank-text bubbles; runs of 2+ newlines are
/// collapsed so the result never renders with blank lines between bubbles.
fn dialogue_text(json: &Value) -> String {
    let bubbles = match json.as_array() {
        Some(b) => b,
        None => return json.to_string(),
    };
    let mut parts: Vec<String> = Vec::new();
    for bubble in bubbles {
        for field in ["text", "image", "custom"] {
            let Some(v) = bubble.get(field) else { continue };
            let piece = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            if !piece.trim().is_empty() {
                parts.push(piece);
            }
        }
    }
    let joined = parts.join("\n");
    NEWLINE_RUN.replace_all(&joined, "\n").into_owned()
}

fn tutor_candidate(json: &Value, raw: &str) -> Candidate {
    let text = json
        .get("answer")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .unwrap_or_else(|| stringify(json, raw));
    let sources = json
        .get("sources")
        .cloned()
        .and_then(|v| serde_json::from_value::<Vec<SourceRef>>(v).ok())
        .unwrap_or_default();
    Candidate { text, sources }
}

fn stringify(json: &Value, raw: &str) -> String {
    serde_json::to_string(json).unwrap_or_else(|_| raw.to_string())
}
