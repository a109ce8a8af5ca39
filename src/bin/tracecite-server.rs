//! tracecite HTTP server.
//!
//! Provides REST endpoints for:
//! - PDF upload, extraction and cited compression
//! - Q&A over previously returned tagged text
//! - Optional static frontend

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracecite::server::{router, AppState};
use tracecite::TraceConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Serve the tracecite API over HTTP.
#[derive(Parser, Debug)]
#[command(name = "tracecite-server", version, about)]
struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 9006)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "TRACECITE_BIND", default_value = "0.0.0.0")]
    bind: std::net::IpAddr,

    /// Directory with the frontend, served for every non-API path.
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// LLM model ID.
    #[arg(long, env = "TRACECITE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "TRACECITE_PROVIDER")]
    provider: Option<String>,

    /// Largest accepted upload in megabytes.
    #[arg(long, env = "TRACECITE_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// Attempts per LLM call when rate limited (first attempt included).
    #[arg(long, env = "TRACECITE_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "TRACECITE_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("tracecite=info,tracecite_server=info,tower_http=debug")
            }),
        )
        .init();

    let mut builder = TraceConfig::builder()
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
        .max_attempts(cli.max_attempts)
        .api_timeout_secs(cli.api_timeout);
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    let config = builder.build().context("Invalid configuration")?;

    if let Some(ref dir) = cli.static_dir {
        info!("Serving frontend from {}", dir.display());
    }

    let state = Arc::new(AppState::new(config));
    let app = router(state, cli.static_dir.clone());

    let addr = SocketAddr::new(cli.bind, cli.port);
    info!("Starting tracecite server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
