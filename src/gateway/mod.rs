//! Gateway module - HTTP and websocket front end (axum)
//!
//! Routes:
//! - `GET /ws/chat`: chat websocket
//! - `GET /schema`, `GET /schema/{table}`: `get_schema` payload
//! - `GET /evaluate?num_queries=N`: run the evaluation harness
//! - `GET /config`, `POST /config`: read and save the config file
//! - `GET /health`: liveness

mod handlers;
mod routes;
pub mod ws;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::agent::AgentLoop;
use crate::config::Config;
use crate::error::Result;
use crate::eval::EvaluationHarness;

pub use routes::create_router;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentLoop>,
    pub harness: EvaluationHarness,
    /// Configuration the process started with
    pub config: Arc<Config>,
    /// File `GET/POST /config` read and write
    pub config_path: PathBuf,
    /// Cancelled on shutdown; websocket runs derive their tokens from it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        agent: Arc<AgentLoop>,
        config: Config,
        config_path: PathBuf,
        shutdown: CancellationToken,
    ) -> Self {
        let harness = EvaluationHarness::new(Arc::clone(&agent), &config.evaluation);
        Self {
            agent,
            harness,
            config: Arc::new(config),
            config_path,
            shutdown,
        }
    }
}

/// Bind `host:port` from the config and serve until `state.shutdown` fires.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!("{}:{}", state.config.gateway.host, state.config.gateway.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Gateway listening");
    serve_listener(listener, state).await
}

/// Serve on an already bound listener.
pub async fn serve_listener(listener: TcpListener, state: AppState) -> Result<()> {
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Shutting down gateway");
        })
        .await?;
    Ok(())
}
