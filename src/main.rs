//! Wisata Chat - nature tour-guide chatbot web front end
//!
//! Forwards user text to the Gemini inference endpoint and renders the reply
//! in a chat-style page. Transcripts are in-memory and per-session.

mod api;
mod config;
mod executor;
mod llm;
mod transcript;

use api::{create_router, AppState};
use config::Config;
use llm::{GeminiChat, LoggingModel};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcript::SeedContext;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wisata_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration failures are fatal before any session exists.
    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "startup configuration failed");
    })?;

    let gemini = GeminiChat::new(
        config.api_key.clone(),
        config.model_name.clone(),
        config.generation,
    )
    .inspect_err(|e| {
        tracing::error!(model = %config.model_name, error = %e, "model initialization failed");
    })?;
    let model = Arc::new(LoggingModel::new(Arc::new(gemini)));

    tracing::info!(model = %config.model_name, "model client initialized");

    let state = AppState::new(model, SeedContext::tour_guide());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Wisata chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
