//! Airwave Station Server
//!
//! A standalone server that hosts shared listening stations and keeps
//! every member's playback in sync.

use airwave_server::{Server, ServerConfig};
use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "airwave-station")]
#[command(about = "Airwave Station Server")]
#[command(version)]
struct Cli {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:7410")]
    listen: SocketAddr,

    /// Server name shown to connecting clients
    #[arg(short, long, default_value = "Airwave Server")]
    name: String,

    /// Maximum concurrent sessions
    #[arg(short, long, default_value_t = 256)]
    max_sessions: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting Airwave Station Server");
    tracing::info!("Listening on: {}", cli.listen);

    let config = ServerConfig {
        name: cli.name.clone(),
        max_sessions: cli.max_sessions,
    };

    let server = Server::new(config);

    tracing::info!("Server ready, accepting connections...");

    let addr_str = cli.listen.to_string();
    server.serve_websocket(&addr_str).await?;

    Ok(())
}
