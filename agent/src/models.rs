//! Wire types shared with the node

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};

/// State-changing contract call carried by a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum ContractCall {
    #[serde(rename = "submitPriceGuess")]
    SubmitPriceGuess { encrypted_value: B256, proof: Bytes },

    #[serde(rename = "allowDecryption")]
    AllowDecryption { grantee: Address },
}

/// Encrypted input plus the proof binding it to (contract, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: B256,
    pub proof: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleContractPair {
    pub handle: B256,
    pub contract: Address,
}

/// User-decryption authorization covered by a single wallet signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionAuthorization {
    pub contracts: Vec<Address>,
    pub start_timestamp: i64,
    pub duration_days: u32,
}

impl DecryptionAuthorization {
    pub fn expires_at(&self) -> i64 {
        self.start_timestamp + i64::from(self.duration_days) * 86_400
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        self.start_timestamp <= now && now < self.expires_at()
    }
}

/// An authorization together with the wallet's signature over it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedAuthorization {
    pub authorization: DecryptionAuthorization,
    pub signature: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignedTransaction {
    pub from: Address,
    pub nonce: u64,
    pub call: ContractCall,
    pub signature: Bytes,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncryptInputRequest {
    pub contract: Address,
    pub user: Address,
    pub value: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDecryptRequest<'a> {
    pub pairs: &'a [HandleContractPair],
    pub user: Address,
    pub authorization: &'a DecryptionAuthorization,
    pub signature: &'a Bytes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecryptedValue {
    pub handle: B256,
    pub value: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserDecryptResponse {
    pub values: Vec<DecryptedValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionSubmitted {
    pub tx_hash: B256,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmittedEvent {
    pub participant: Address,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub status: bool,
    pub events: Vec<SubmittedEvent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventLog {
    pub block_number: u64,
    pub tx_hash: B256,
    pub participant: Address,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeHealth {
    pub status: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub contract: Address,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HasSubmittedResponse {
    pub has_submitted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EncryptedGuessResponse {
    pub handle: B256,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LastGuessTimestampResponse {
    pub timestamp: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NonceResponse {
    pub nonce: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}
