mod agent_client;
mod agents;
mod config;
mod errors;
mod orchestration;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::agent_client::AgentClient;
use crate::config::Config;
use crate::orchestration::run::RunController;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Screener v{}", env!("CARGO_PKG_VERSION"));

    // Missing agent settings keep the server up but refuse runs.
    let agent_client = match config.agent_service() {
        Ok(service) => {
            let client = AgentClient::new(&service)?;
            info!(
                "Agent client initialized (endpoint: {}, model: {})",
                service.endpoint,
                client.model()
            );
            Some(client)
        }
        Err(missing) => {
            warn!("{missing}; runs will be rejected until it is configured");
            None
        }
    };

    info!(
        "Runs limited to {} rounds; serving UI from '{}'",
        config.max_rounds, config.ui_dir
    );

    let state = AppState {
        config: config.clone(),
        agent_client,
        runs: RunController::new(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
