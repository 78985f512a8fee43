//! Gateway configuration loaded from TOML and environment.
//!
//! Defaults describe a local development topology (completion/guard capability
//! on :8001, Rasa on :5005, tutoring service on :8002).
//!
//! | Key (env: CHATGATE__*) | Default | Description |
//! |------------------------|---------|-------------|
//! | llm_base_url | http://localhost:8001 | Completion/guard capability base URL. |
//! | rasa_base_url | http://localhost:5005 | Dialogue (Rasa) service base URL. |
//! | tutor_base_url | http://localhost:8002 | Tutoring service base URL. |
//! | tutor_chat_suffix | /chat | Path suffix appended to `/tutors/{id}`. |
//! | sources_mount | /static/sources | Static mount prefix for source links. |
//! | port | 8080 | Gateway listen port. |
//! | upstream_timeout_secs | 30 | Per-call network timeout (upstream and guard). |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Gateway configuration. Load precedence: env `CHATGATE_CONFIG` path >
/// `config/gateway.toml` > defaults; `CHATGATE__*` env vars override either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the completion/guard capability (`/v1/chat/*` is suffixed).
    pub llm_base_url: String,
    /// Base URL of the dialogue service (Rasa REST webhook).
    pub rasa_base_url: String,
    /// Base URL of the tutoring service.
    pub tutor_base_url: String,
    /// Path suffix of the per-tutor chat endpoint.
    pub tutor_chat_suffix: String,
    /// Static-asset mount point prefixed to rendered source links.
    pub sources_mount: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Timeout applied to each upstream and guard call.
    pub upstream_timeout_secs: u64,
}

impl GatewayConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CHATGATE_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("llm_base_url", "http://localhost:8001")?
            .set_default("rasa_base_url", "http://localhost:5005")?
            .set_default("tutor_base_url", "http://localhost:8002")?
            .set_default("tutor_chat_suffix", "/chat")?
            .set_default("sources_mount", "/static/sources")?
            .set_default("port", 8080_i64)?
            .set_default("upstream_timeout_secs", 30_i64)?;

        let path = Path::new(&config_path);
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(config::Environment::with_prefix("CHATGATE").separator("__"))
            .build()?;

        built.try_deserialize()
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs.max(1))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            llm_base_url: "http://localhost:8001".to_string(),
            rasa_base_url: "http://localhost:5005".to_string(),
            tutor_base_url: "http://localhost:8002".to_string(),
            tutor_chat_suffix: "/chat".to_string(),
            sources_mount: "/static/sources".to_string(),
            port: 8080,
            upstream_timeout_secs: 30,
        }
    }
}
