use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tictactoe_simulator::{Api, Simulator, SimulatorConfig};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Local tic-tac-toe room server")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 5000)]
    port: u16,

    /// Seconds between idle-room sweeps
    #[arg(long, default_value_t = 600)]
    cleanup_interval_secs: u64,

    /// Seconds a room may sit idle before it is evicted
    #[arg(long, default_value_t = 3600)]
    room_ttl_secs: u64,

    #[arg(long, default_value = "info")]
    log_level: String,
}

fn build_config(args: &Args) -> Result<SimulatorConfig> {
    if args.cleanup_interval_secs == 0 {
        anyhow::bail!("cleanup_interval_secs must be greater than zero");
    }
    Ok(SimulatorConfig {
        room_ttl: Duration::from_secs(args.room_ttl_secs),
        cleanup_interval: Duration::from_secs(args.cleanup_interval_secs),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let level = Level::from_str(&args.log_level).context("invalid log level")?;
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = build_config(&args)?;
    let simulator = Arc::new(Simulator::new(config));
    let cleanup = simulator.spawn_cleanup();
    let router = Api::new(simulator).router();

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "simulator listening");

    let served = axum::serve(listener, router).await;
    cleanup.abort();
    served.context("server error")
}
