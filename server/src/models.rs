//! Data models for API requests/responses

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::contract::PriceGuessSubmitted;
use crate::fhe::gateway::{DecryptedValue, HandleContractPair};
use crate::messages::DecryptionAuthorization;

/// State-changing contract call carried by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum ContractCall {
    #[serde(rename = "submitPriceGuess")]
    SubmitPriceGuess { encrypted_value: B256, proof: Bytes },

    #[serde(rename = "allowDecryption")]
    AllowDecryption { grantee: Address },
}

/// Transaction personal-signed by `from`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub from: Address,
    pub nonce: u64,
    pub call: ContractCall,
    pub signature: Bytes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSubmitted {
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: B256,
    pub from: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub status: bool,
    pub events: Vec<PriceGuessSubmitted>,
}

/// `PriceGuessSubmitted` with its log position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub block_number: u64,
    pub tx_hash: B256,
    #[serde(flatten)]
    pub event: PriceGuessSubmitted,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsQuery {
    pub participant: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HasSubmittedResponse {
    pub address: Address,
    pub has_submitted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncryptedGuessResponse {
    pub address: Address,
    pub handle: B256,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastGuessTimestampResponse {
    pub address: Address,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NonceResponse {
    pub address: Address,
    pub nonce: u64,
}

/// Relayer input request. The plaintext ends here and goes no further.
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptInputRequest {
    pub contract: Address,
    pub user: Address,
    pub value: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDecryptRequest {
    pub pairs: Vec<HandleContractPair>,
    pub user: Address,
    pub authorization: DecryptionAuthorization,
    pub signature: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDecryptResponse {
    pub values: Vec<DecryptedValue>,
}

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub contract: Address,
    pub version: String,
}
