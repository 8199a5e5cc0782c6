//! Notary Server - standalone entry point for the Notary API
//!
//! Thin wrapper around `notary-api` that reads the environment, builds the
//! components and serves until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use notary_api::{NotaryServer, ServerConfig};

/// Environment lookup where a platform-assigned `PORT` stands in for `NOTARY_PORT`
fn lookup(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) => Some(value),
        Err(_) if key == "NOTARY_PORT" => std::env::var("PORT").ok(),
        Err(_) => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    notary_api::init_tracing();

    tracing::info!("Starting Notary server v{}", env!("CARGO_PKG_VERSION"));

    if std::env::var("NOTARY_PORT").is_err() {
        if let Ok(port) = std::env::var("PORT") {
            tracing::info!("Using PORT {} as NOTARY_PORT", port);
        }
    }

    let config = ServerConfig::from_lookup(lookup);
    tracing::debug!(?config, "Server configuration");

    let server = NotaryServer::from_env(config)
        .await
        .context("failed to initialize server")
        .inspect_err(|e| tracing::error!("{:#}", e))?;

    server
        .run()
        .await
        .context("server error")
        .inspect_err(|e| tracing::error!("{:#}", e))?;

    Ok(())
}
