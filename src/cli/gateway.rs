//! Gateway command handler (HTTP + websocket server).

use std::path::Path;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use sqlmatic::gateway::{serve, AppState};

use super::common::{create_agent, load_config};

/// Start the gateway and run until Ctrl-C.
pub(crate) async fn cmd_gateway(
    config_path: &Path,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!(
        "Starting SQLMatic gateway on {}:{}",
        config.gateway.host, config.gateway.port
    );

    let agent = create_agent(&config).await?;
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C");
            signal.cancel();
        }
    });

    let state = AppState::new(agent, config, config_path.to_path_buf(), shutdown);
    serve(state).await.with_context(|| "Gateway failed")?;

    println!("Gateway stopped.");
    Ok(())
}
