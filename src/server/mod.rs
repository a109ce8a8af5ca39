//! HTTP adapter: upload a PDF, get a cited summary, ask questions.
//!
//! Endpoints:
//! - `GET  /health`      — liveness probe
//! - `POST /api/process` — multipart `file` → extraction + summary
//! - `POST /api/chat`    — `{question, tagged_text}` → answer + evidence
//!
//! The server keeps no per-document state. The client holds the tagged
//! text returned by `/api/process` and sends it back with each question.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::{ChatRequest, ChatResponse, ProcessResponse};

use crate::config::TraceConfig;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Shared state for every request.
pub struct AppState {
    pub config: TraceConfig,
}

impl AppState {
    pub fn new(config: TraceConfig) -> Self {
        Self { config }
    }
}

/// Build the application router.
///
/// With `static_dir` set, unmatched paths are served from that directory
/// (the single-page frontend).
pub fn router(state: Arc<AppState>, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.max_upload_bytes;

    let mut app = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/process", post(handlers::process))
        .route("/api/chat", post(handlers::chat))
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
