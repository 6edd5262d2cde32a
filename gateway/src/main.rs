mod api;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::routes::AppState;
use textchart_core::{ChartError, Config, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logging Setup
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    info!("textchart gateway initializing...");

    // 2. Configuration, read once
    let config = Config::from_env();

    // 3. Upstream clients. Without credentials the server still starts and
    // /api/parse reports the problem per request.
    let orchestrator = match Orchestrator::from_config(&config) {
        Ok(o) => Some(Arc::new(o)),
        Err(ChartError::Configuration) => {
            warn!("OPENROUTER_API_KEY or EXA_API_KEY missing; /api/parse will answer 400");
            None
        }
        Err(e) => {
            return Err(anyhow::Error::new(e).context("Failed to initialize upstream clients"))
        }
    };

    // 4. Routes
    let app = routes::router(AppState { orchestrator });

    // 5. Start Server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Gateway listening on http://localhost:{}", config.port);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
