use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use courier::AppState;
use courier::config::{CourierConfig, RuntimeOverrides};

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Realtime nickname relay with media uploads")]
struct Args {
    /// Path to the config file (missing file is fine)
    #[arg(short, long, default_value = "courier.toml")]
    config: PathBuf,

    /// Host to bind both listeners to
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port for the HTTP API (health, upload, download)
    #[arg(long)]
    http_port: Option<u16>,

    /// Port for the WebSocket relay
    #[arg(long)]
    ws_port: Option<u16>,

    /// Directory for uploaded media
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --debug
    let default_filter = if args.debug {
        "courier=debug,courier_relay=debug,tower_http=debug"
    } else {
        "courier=info,courier_relay=info,tower_http=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let overrides = RuntimeOverrides {
        host: args.host,
        http_port: args.http_port,
        ws_port: args.ws_port,
        storage_dir: args.storage_dir,
    };
    let config = CourierConfig::load(&args.config, &overrides)?;
    let state = AppState::new(&config)?;

    let http_listener = TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", config.http_addr))?;
    let ws_listener = TcpListener::bind(config.ws_addr)
        .await
        .with_context(|| format!("Failed to bind WebSocket listener on {}", config.ws_addr))?;
    info!(addr = %http_listener.local_addr()?, "http server running");
    info!(addr = %ws_listener.local_addr()?, "websocket server running");

    let shutdown = state.shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = ?err, "failed to install ctrl-c handler");
            return;
        }
        info!("shutdown requested");
        shutdown.cancel();
    });

    let http = tokio::spawn(
        axum::serve(http_listener, courier::http_router(state.clone()))
            .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
            .into_future(),
    );
    let ws = tokio::spawn(
        axum::serve(ws_listener, courier::ws_router(state.clone()))
            .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
            .into_future(),
    );

    let (http, ws) = tokio::join!(http, ws);
    http.context("HTTP server task failed")?
        .context("HTTP server error")?;
    ws.context("WebSocket server task failed")?
        .context("WebSocket server error")?;

    info!("courier stopped");
    Ok(())
}
