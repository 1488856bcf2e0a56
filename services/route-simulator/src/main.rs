//! Route Simulator Server
//!
//! Fake GraphHopper endpoint for load testing without map data.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use route_simulator::state::SimulatorState;

/// Route Simulator Server
#[derive(Parser, Debug)]
#[command(name = "route-simulator")]
#[command(about = "Simulated GraphHopper routing server with random response delays")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8989", env = "SIMULATOR_LISTEN_ADDR")]
    listen: String,

    /// Minimum response delay in milliseconds
    #[arg(long, default_value_t = 50)]
    min_delay_ms: u64,

    /// Maximum response delay in milliseconds
    #[arg(long, default_value_t = 500)]
    max_delay_ms: u64,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_target(true);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let state = SimulatorState::new(
        Duration::from_millis(args.min_delay_ms),
        Duration::from_millis(args.max_delay_ms),
    )?;
    let app = route_simulator::router(Arc::new(state));

    let addr: SocketAddr = args
        .listen
        .parse()
        .with_context(|| format!("invalid listen address: {}", args.listen))?;

    info!(
        %addr,
        min_delay_ms = args.min_delay_ms,
        max_delay_ms = args.max_delay_ms,
        "Route simulator listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Received shutdown signal");
        })
        .await
        .context("server failed")?;

    Ok(())
}
