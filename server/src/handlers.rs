//! HTTP handlers exposing the contract, the relayer and the gateway

use alloy_primitives::{Address, B256};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::fhe::EncryptedInput;
use crate::models::*;
use crate::services::chain::ChainService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub chain: Arc<ChainService>,
}

impl AppState {
    pub fn new(chain: ChainService) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }
}

fn parse_address(raw: &str) -> Result<Address, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid address: {}", raw)))
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        chain_id: state.chain.chain_id(),
        block_number: state.chain.block_number().await,
        contract: state.chain.contract_address(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// `hasSubmitted(address)`
pub async fn has_submitted(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<HasSubmittedResponse>, AppError> {
    let address = parse_address(&address)?;
    Ok(Json(HasSubmittedResponse {
        address,
        has_submitted: state.chain.has_submitted(address).await,
    }))
}

/// `encryptedGuessOf(address)`
pub async fn encrypted_guess(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<EncryptedGuessResponse>, AppError> {
    let address = parse_address(&address)?;
    Ok(Json(EncryptedGuessResponse {
        address,
        handle: state.chain.encrypted_guess_of(address).await,
    }))
}

/// `lastGuessTimestamp(address)`
pub async fn last_guess_timestamp(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<LastGuessTimestampResponse>, AppError> {
    let address = parse_address(&address)?;
    Ok(Json(LastGuessTimestampResponse {
        address,
        timestamp: state.chain.last_guess_timestamp(address).await,
    }))
}

pub async fn events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventLog>>, AppError> {
    let participant = query
        .participant
        .as_deref()
        .map(parse_address)
        .transpose()?;
    Ok(Json(state.chain.events(participant).await))
}

pub async fn account_nonce(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<NonceResponse>, AppError> {
    let address = parse_address(&address)?;
    Ok(Json(NonceResponse {
        address,
        nonce: state.chain.nonce(address).await,
    }))
}

/// Execute a signed transaction. Reverts surface with their reason string.
pub async fn send_transaction(
    State(state): State<AppState>,
    Json(tx): Json<SignedTransaction>,
) -> Result<Json<TransactionSubmitted>, AppError> {
    let from = tx.from;
    let tx_hash = state.chain.send_transaction(tx).await.map_err(|e| {
        tracing::warn!("Transaction from {} rejected: {}", from, e);
        AppError::from(e)
    })?;
    Ok(Json(TransactionSubmitted { tx_hash }))
}

pub async fn transaction_receipt(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Json<TransactionReceipt>, AppError> {
    let hash: B256 = tx_hash
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid transaction hash: {}", tx_hash)))?;
    let receipt = state
        .chain
        .receipt(hash)
        .await
        .ok_or_else(|| AppError::NotFound(format!("receipt for {}", tx_hash)))?;
    Ok(Json(receipt))
}

/// Relayer: encrypt a value for (contract, user)
pub async fn encrypt_input(
    State(state): State<AppState>,
    Json(request): Json<EncryptInputRequest>,
) -> Result<Json<EncryptedInput>, AppError> {
    let input = state
        .chain
        .encrypt_input(request.contract, request.user, request.value)
        .await;
    Ok(Json(input))
}

/// Gateway: user decryption
pub async fn user_decrypt(
    State(state): State<AppState>,
    Json(request): Json<UserDecryptRequest>,
) -> Result<Json<UserDecryptResponse>, AppError> {
    let values = state
        .chain
        .user_decrypt(
            &request.pairs,
            request.user,
            &request.authorization,
            &request.signature,
        )
        .await
        .map_err(|e| {
            tracing::warn!("User decryption for {} refused: {}", request.user, e);
            AppError::from(e)
        })?;
    Ok(Json(UserDecryptResponse { values }))
}
