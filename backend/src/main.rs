//! Pizzaz MCP server.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use pizzaz::capabilities::{AssetDir, CapabilityRegistry, WidgetDelivery};
use pizzaz::config::{Config, ConfigOverrides};
use pizzaz::{create_app, logging, state::AppState};

/// Pizzaz - MCP server exposing the Pizzaz widget tools over SSE
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PIZZAZ_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "PIZZAZ_HOST")]
    host: Option<String>,

    /// Directory holding the built widget bundles
    #[arg(long, env = "PIZZAZ_ASSETS_DIR")]
    assets_dir: Option<PathBuf>,

    /// How tool results refer to their widget
    #[arg(long, value_enum, env = "PIZZAZ_WIDGET_DELIVERY")]
    widget_delivery: Option<WidgetDelivery>,

    /// Seconds between keep-alive comments on each push stream
    #[arg(long, env = "PIZZAZ_HEARTBEAT_SECS")]
    heartbeat_secs: Option<u64>,

    /// Additional config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_figment(ConfigOverrides {
        port: args.port,
        host: args.host,
        assets_dir: args.assets_dir,
        widget_delivery: args.widget_delivery,
        heartbeat_secs: args.heartbeat_secs,
        config_file: args.config,
    })?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = logging::init(config.log_file.as_deref(), config.log_level.as_deref());

    info!("Starting Pizzaz MCP server...");

    // The catalog must be complete before the listener accepts connections
    let store = AssetDir::new(&config.assets_dir);
    let capabilities = CapabilityRegistry::load(&store, config.widget_delivery)
        .with_context(|| format!("Failed to load widgets from {}", config.assets_dir.display()))?;

    let state = AppState::new(capabilities, config.transport_settings());
    let shutdown = CancellationToken::new();
    let reaper = state.spawn_idle_reaper(shutdown.clone());

    let app = create_app(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", listener.local_addr()?);
    info!(
        "MCP push stream at {}, messages at {}",
        config.mcp_path, config.messages_path
    );

    // Set up graceful shutdown handler
    let shutdown_signal = {
        let state = state.clone();
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }

            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.cancel();
            // Ends every open push stream so connections can drain
            state.sessions().close_all();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    if let Some(reaper) = reaper {
        reaper.abort();
    }
    info!("Server shut down");
    Ok(())
}
