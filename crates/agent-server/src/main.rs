//! Tool agent HTTP Server
//!
//! Axum-based server exposing the tool agent workflow over REST.

mod config;
mod handlers;
mod middleware;
mod state;
mod workflow;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{InMemoryStore, LlmProvider};
use agent_runtime::OllamaProvider;

use crate::config::ServerConfig;
use crate::handlers::{health_check, list_models, tool_agent};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    // Initialize LLM provider
    let provider = connect_provider()?;

    // Verify provider connection
    match provider.health_check().await {
        Ok(true) => {
            tracing::info!("✓ Connected to {}", provider.name());
            if let Ok(models) = provider.list_models().await {
                for model in models {
                    tracing::info!("  Model: {}", model.id);
                }
            }
        }
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not available - agent runs will fail", provider.name());
            tracing::warn!("  For Ollama, make sure it is running: ollama serve");
        }
    }

    let tools = agent_tools::default_registry();
    tracing::info!("Registered {} tools:", tools.len());
    for name in tools.names() {
        tracing::info!("  • {}", name);
    }

    let orchestrator = workflow::tool_agent_orchestrator(
        provider.clone(),
        tools,
        Arc::new(InMemoryStore::new()),
        config.agent,
    )?;

    let state = AppState {
        provider,
        orchestrator: Arc::new(orchestrator),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("Tool agent server running on http://{}", config.bind_addr);
    tracing::info!("  GET  /health                    - Health check");
    tracing::info!("  GET  /api/models                - List available models");
    tracing::info!("  POST /api/workflows/tool_agent  - Run the tool agent");

    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

/// Ollama by default; `LLM_PROVIDER=gemini` selects Gemini when built with
/// the `gemini` feature
fn connect_provider() -> anyhow::Result<Arc<dyn LlmProvider>> {
    #[cfg(feature = "gemini")]
    if std::env::var("LLM_PROVIDER").is_ok_and(|p| p.trim().eq_ignore_ascii_case("gemini")) {
        let provider = agent_runtime::GeminiProvider::from_env()?;
        tracing::info!(model = %provider.config().default_model, "Using Gemini provider");
        return Ok(Arc::new(provider));
    }

    let provider = OllamaProvider::from_env()?;
    tracing::info!(url = %provider.config().base_url(), "Using Ollama provider");
    Ok(Arc::new(provider))
}

fn build_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/models", get(list_models))
        // Workflows
        .route("/api/workflows/tool_agent", post(tool_agent))
        .layer(axum::middleware::from_fn(middleware::conversation_id))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
