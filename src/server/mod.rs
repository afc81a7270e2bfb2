//! HTTP server for the chat relay
//!
//! Endpoints:
//! - GET  /api/health      - Health check
//! - POST /api/chat        - One-shot chat (JSON response)
//! - POST /api/chat/stream - SSE streaming chat
//! - POST /api/digest      - Manual digest trigger

mod handlers;
pub mod types;

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::digest::DigestStore;
use crate::image::ImageBackend;
use crate::provider::Provider;

/// Max request body size (base64 image uploads run large).
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn Provider>,
    pub images: Arc<dyn ImageBackend>,
    pub digests: Arc<dyn DigestStore>,
    pub model_id: String,
}

/// Create the router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(handlers::health_handler))
        .route("/api/chat", post(handlers::chat_handler))
        .route("/api/chat/stream", post(handlers::chat_stream_handler))
        .route("/api/digest", post(handlers::digest_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = create_router(state);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "chat relay listening");

    axum::serve(listener, app).await?;

    Ok(())
}
