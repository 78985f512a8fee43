//! Axum-based chat dispatch gateway. Config-driven via GatewayConfig.
//!
//! Sits between end users and three conversational backends (completion,
//! dialogue, tutoring), normalizes their response shapes, and pipes guarded
//! routes through the safety gateway before replies reach the caller.

mod handlers;

use axum::{
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatgate_core::{
    http_client, CompletionClient, DialogueClient, Dispatcher, GatewayConfig, SafetyGateway,
    TutorClient,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) config: Arc<GatewayConfig>,
    pub(crate) dispatcher: Arc<Dispatcher>,
    /// Concrete clients kept alongside the dispatcher for passthrough routes.
    pub(crate) completion: Arc<CompletionClient>,
    pub(crate) dialogue: Arc<DialogueClient>,
    pub(crate) tutor: Arc<TutorClient>,
}

pub(crate) fn build_state(config: GatewayConfig) -> reqwest::Result<AppState> {
    let http = http_client(config.upstream_timeout())?;
    let completion = Arc::new(CompletionClient::new(http.clone(), &config.llm_base_url));
    let dialogue = Arc::new(DialogueClient::new(http.clone(), &config.rasa_base_url));
    let tutor = Arc::new(TutorClient::new(
        http.clone(),
        &config.tutor_base_url,
        &config.tutor_chat_suffix,
    ));
    let guard = SafetyGateway::new(http, &config.llm_base_url);
    let dispatcher = Arc::new(Dispatcher::new(
        completion.clone(),
        dialogue.clone(),
        tutor.clone(),
        guard,
    ));
    Ok(AppState {
        config: Arc::new(config),
        dispatcher,
        completion,
        dialogue,
        tutor,
    })
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

pub(crate) fn build_app(state: AppState) -> Router {
    // The gateway fronts browser callers directly; admission control lives in
    // the deployment layer, so CORS stays permissive here.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/chat/completions", post(handlers::chat::completions))
        .route("/v1/chat/safe", post(handlers::chat::safe))
        .route("/rasa/chat", post(handlers::rasa::chat))
        .route("/rasa/chat-safe", post(handlers::rasa::chat_safe))
        .route("/rasa/status", get(handlers::rasa::status))
        .route(
            "/tutor/tutors",
            get(handlers::tutor::list).post(handlers::tutor::upsert),
        )
        .route("/tutor/tutors/:id/chat", post(handlers::tutor::chat))
        .with_state(state)
        .layer(cors)
}

#[tokio::main]
async fn main() {
    // API keys and upstream addresses stay in the backend environment; the
    // front end never receives them.
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[chatgate-gateway] .env not loaded: {e} (using system environment)");
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config load failed: {e}");
            std::process::exit(1);
        }
    };
    let port = config.port;
    tracing::info!(
        llm = %config.llm_base_url,
        rasa = %config.rasa_base_url,
        tutor = %config.tutor_base_url,
        "chatgate upstream topology"
    );

    let state = match build_state(config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("http client init failed: {e}");
            std::process::exit(1);
        }
    };
    let app = build_app(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("chatgate-gateway listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("bind {addr} failed: {e}");
            std::process::exit(1);
        }
    };
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("server error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown initiated (ctrl-c received)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> Router {
        build_app(build_state(GatewayConfig::default()).expect("state"))
    }

    async fn body_json(res: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_unconditional() {
        let res = app()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn non_json_content_type_is_rejected_before_dispatch() {
        let res = app()
            .oneshot(
                Request::post("/rasa/chat")
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn missing_message_is_a_client_error() {
        let res = app()
            .oneshot(
                Request::post("/rasa/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"sender": "s1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["error"], "client_error");
    }

    #[tokio::test]
    async fn empty_messages_array_is_a_client_error_on_completion_route() {
        let res = app()
            .oneshot(
                Request::post("/v1/chat/completions")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"messages": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
