//! Chat dispatch core: everything between the inbound route and the final body.
//!
//! Pipeline: upstream client → response normalizer → (optional) safety gateway
//! → text sanitizer → content renderer. Each request owns its own
//! `UpstreamEnvelope`/`Candidate`/`GuardVerdict`; nothing here outlives a
//! request and no state is shared across requests.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod normalize;
pub mod render;
pub mod sanitize;
pub mod upstream;

pub use config::GatewayConfig;
pub use dispatch::{routes, ChatRequest, DispatchOutcome, Dispatcher, RouteSpec, Turn, UpstreamKind};
pub use error::GatewayError;
pub use guard::{GuardVerdict, SafetyGateway};
pub use normalize::{normalize, Candidate, Shape, SourceRef};
pub use render::{negotiate, OutputFormat};
pub use sanitize::sanitize;
pub use upstream::{
    http_client, ChatUpstream, CompletionClient, DialogueClient, ParsedBody, TutorClient,
    UpstreamEnvelope,
};
