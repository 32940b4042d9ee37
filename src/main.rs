//! Vizbridge - Session bridge between autonomous agents and a
//! visualization/control plane
//!
//! The binary opens a bridge connection for one session and keeps it alive
//! until interrupted. The agent itself runs elsewhere in the process and
//! talks to the bridge only through the event bus.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vizbridge::{config::BridgeConfig, events::EventBus, BridgeManager};

#[derive(Parser)]
#[command(name = "vizbridge")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Session bridge to a visualization control plane")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "VIZBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Session to bridge
    #[arg(short, long, env = "VIZBRIDGE_SESSION_ID")]
    session_id: String,

    /// Control plane endpoint; overrides the configured one
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vizbridge={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match cli.config {
        Some(path) => BridgeConfig::load(&path)?,
        None => BridgeConfig::default(),
    };
    let endpoint = cli
        .endpoint
        .unwrap_or_else(|| config.control_plane.endpoint.clone());

    let bus = Arc::new(EventBus::new());
    let manager = BridgeManager::new(bus, config);

    if manager
        .create_connection(&cli.session_id, &endpoint)
        .await
        .is_none()
    {
        anyhow::bail!("failed to connect to control plane at {}", endpoint);
    }
    tracing::info!(session_id = %cli.session_id, %endpoint, "Bridge running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    manager.close_all_connections().await;

    Ok(())
}
