//! PriceGuess development node
//!
//! Serves the PriceGuess contract, FHE relayer and decryption gateway.

use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use price_guess_node::{app, config::Config, services::chain::ChainService, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_guess_node=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting PriceGuess node");
    tracing::info!("Chain ID: {}", config.chain_id);
    tracing::info!("PriceGuess contract: {}", config.contract_address);

    let chain = ChainService::new(&config)?;
    let state = AppState::new(chain);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
