//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::{ReactAgent, RunOptions};
use crate::config::Config;
use crate::llm::OpenAiCompatibleClient;
use crate::tools::{AmapClient, ToolRegistry};

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// The agent used for chat runs; stateless, shared across requests
    pub agent: ReactAgent,
    /// Registered tools, for the listing endpoint
    pub tools: Arc<ToolRegistry>,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let amap = AmapClient::new(config.amap_api_key.clone());
    let tools = Arc::new(ToolRegistry::with_amap(amap));

    let llm = Arc::new(OpenAiCompatibleClient::with_base_url(
        config.deepseek_api_key.clone(),
        config.deepseek_base_url.clone(),
    ));
    let agent = ReactAgent::new(llm, Arc::clone(&tools), config.default_model.clone());

    let state = Arc::new(AppState {
        config: config.clone(),
        agent,
        tools,
    });

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/tools", get(list_tools))
        .route("/api/chat", post(chat))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    // Setup graceful shutdown on SIGTERM/SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.config.default_model.clone(),
        max_iterations: state.config.max_iterations,
    })
}

/// List the registered tools.
async fn list_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolSummary>> {
    let tools = state
        .tools
        .descriptors()
        .into_iter()
        .map(|descriptor| ToolSummary {
            name: descriptor.name,
            human_name: descriptor.human_name,
            description: descriptor.description,
        })
        .collect();
    Json(tools)
}

/// Run one query through the agent.
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, (StatusCode, String)> {
    let prompt = match req.location_context.as_deref() {
        Some(address) => format!(
            "【系统提示：用户当前所在的精确位置是：{}。请基于此位置回答。】\n{}",
            address, req.message
        ),
        None => req.message.clone(),
    };

    let options = RunOptions {
        max_iterations: req.max_iterations.unwrap_or(state.config.max_iterations),
        verbose: true,
        deadline: None,
    };

    let reply = state
        .agent
        .run_with_options(&prompt, options)
        .await
        .map_err(|e| {
            tracing::error!("Agent run failed: {}", e);
            (StatusCode::BAD_GATEWAY, format!("Agent run failed: {}", e))
        })?;

    let map_url =
        extract_map_url(&reply).map(|url| repair_map_key(&url, &state.config.amap_api_key));

    Ok(Json(ChatReply { reply, map_url }))
}
