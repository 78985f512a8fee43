//! Error taxonomy for the dispatch pipeline.
//!
//! Only failures that this process *decides* are modeled here. Upstream
//! rejections (non-2xx) and guard blocks are not errors — they are carried
//! through as data (`UpstreamEnvelope` / `GuardVerdict`) so the caller sees
//! the deciding stage's own status code.

use thiserror::Error;

/// Failures handled locally and turned into a final response without retry.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or incomplete request. Rejected before any upstream call.
    #[error("bad request: {0}")]
    Client(String),
    /// Request body is not the expected structured format.
    #[error("unsupported media type: {0}")]
    MediaType(String),
    /// Upstream unreachable, connection reset, or timed out.
    #[error("upstream transport failure: {0}")]
    Transport(String),
}

impl GatewayError {
    /// HTTP status for the final response.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Client(_) => 400,
            GatewayError::MediaType(_) => 415,
            GatewayError::Transport(_) => 502,
        }
    }

    /// Machine-readable tag used in error bodies.
    pub fn tag(&self) -> &'static str {
        match self {
            GatewayError::Client(_) => "client_error",
            GatewayError::MediaType(_) => "client_error",
            GatewayError::Transport(_) => "transport_error",
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        // Keep the detail generic: transport failures must not leak connection
        // internals to end users.
        let detail = if e.is_timeout() {
            "upstream timed out"
        } else if e.is_connect() {
            "upstream unreachable"
        } else {
            "upstream connection failed"
        };
        GatewayError::Transport(detail.to_string())
    }
}
