//! Demo server instrumented with the APM middleware.
//!
//! ```text
//! Client ──▶ ApmService (wraps the router, opens transaction, raw path name)
//!                 │
//!                 ▼
//!            axum routing ──▶ TraceLayer
//!                 │
//!                 ▼
//!            ApmLayer route_layer (renames to route template)
//!                 │
//!                 ▼
//!              handler
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use apm_middleware::config::{load_config, AgentConfig};
use apm_middleware::observability::logging;
use apm_middleware::{Agent, ApmLayer, ApmService, LogReporter};
use axum::extract::{Path, Request};
use axum::{http::StatusCode, routing::get, Json, Router, ServiceExt};
use clap::Parser;
use tokio::net::TcpListener;
use tower::Layer;
use tower_http::trace::TraceLayer;

#[derive(Parser)]
#[command(name = "apm-middleware")]
#[command(about = "Demo HTTP server with APM request tracing", long_about = None)]
struct Cli {
    /// Agent config file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AgentConfig::default(),
    };

    logging::init(&config.logging)?;

    tracing::info!(
        service = %config.service_name,
        bind_address = %cli.bind,
        "apm-middleware demo starting"
    );

    let agent = Arc::new(Agent::new(config, Arc::new(LogReporter))?);
    let app = build_app(agent);

    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_app(agent: Arc<Agent>) -> ApmService<Router> {
    let router = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/health", get(|| async { "healthy" }))
        .route("/users/{id}", get(get_user))
        .route("/fail", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "failed") }))
        .route_layer(ApmLayer::new(agent.clone()))
        .layer(TraceLayer::new_for_http());

    ApmLayer::new(agent).layer(router)
}

async fn get_user(Path(id): Path<u64>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "id": id, "name": format!("user-{id}") }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Shutdown signal received");
}
