//! Standalone liveness server
//!
//! Answers `GET /` and `GET /health` on `PORT` (default 3000) without any
//! GitHub credentials, for platforms that check liveness before secrets are wired.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "health-server")]
#[command(about = "Liveness endpoints for the uwularpy deployment")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    uwularpy::init_tracing();
    let args = Args::parse();

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Server is running on port {}", args.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, uwularpy::server::health_router()).await?;

    Ok(())
}
