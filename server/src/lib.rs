//! PriceGuess development node
//!
//! Hosts the PriceGuess contract on an in-process chain together with a
//! mock FHE coprocessor (encrypted inputs, ACL) and a user-decryption
//! gateway, all served over HTTP.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod contract;
pub mod error;
pub mod fhe;
pub mod handlers;
pub mod messages;
pub mod models;
pub mod services;

pub use handlers::AppState;

/// Build the node's router
pub fn app(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health))

        // Contract views
        .route("/api/v1/contract/has-submitted/:address", get(handlers::has_submitted))
        .route("/api/v1/contract/encrypted-guess/:address", get(handlers::encrypted_guess))
        .route(
            "/api/v1/contract/last-guess-timestamp/:address",
            get(handlers::last_guess_timestamp),
        )
        .route("/api/v1/contract/events", get(handlers::events))

        // Transactions
        .route("/api/v1/accounts/:address/nonce", get(handlers::account_nonce))
        .route("/api/v1/transactions", post(handlers::send_transaction))
        .route("/api/v1/transactions/:hash/receipt", get(handlers::transaction_receipt))

        // FHE relayer and gateway
        .route("/api/v1/relayer/input", post(handlers::encrypt_input))
        .route("/api/v1/relayer/user-decrypt", post(handlers::user_decrypt))

        // State
        .with_state(state)

        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
