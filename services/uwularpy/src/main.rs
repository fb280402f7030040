//! uwularpy webhook server
//!
//! ## Usage
//! ```bash
//! APP_ID=123456 \
//! PRIVATE_KEY="$(cat key.pem)" \
//! WEBHOOK_SECRET=... \
//! uwularpy --port 3000
//! ```
//!
//! Variables in a `.env` file in the working directory are loaded first;
//! the process environment wins over the file.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use uwularpy::auth::AppInstallations;
use uwularpy::server::{router, AppState};
use uwularpy::signature::SignatureVerifier;
use uwularpy::uwu::Uwuifier;
use uwularpy::{Config, Dispatcher, Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    uwularpy::init_tracing();

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    info!(
        app_id = %config.app_id,
        api = %config.github_api_url,
        base_branch = %config.base_branch,
        trigger = %config.trigger,
        "Starting uwularpy"
    );

    let http = reqwest::Client::builder()
        .user_agent("uwularpy")
        .build()
        .context("Failed to build HTTP client")?;

    let installations = AppInstallations::new(
        http,
        &config.github_api_url,
        &config.app_id,
        &config.private_key_pem()?,
    )
    .context("Failed to load GitHub App credentials")?;

    let dispatcher = Dispatcher::new(
        SignatureVerifier::new(config.webhook_secret.as_bytes()),
        &config.trigger,
        Arc::new(installations),
        Pipeline::new(&config.base_branch, Arc::new(Uwuifier)),
    );

    let app = router(AppState {
        dispatcher: Arc::new(dispatcher),
    });

    let addr = config.listen_addr();
    info!("Server is running on port {}", addr.port());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
