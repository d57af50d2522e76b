//! Consumed interfaces of the external chain, wallet and FHE subsystems

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::AgentResult;
use crate::models::{EncryptedInput, HandleContractPair, SignedAuthorization, TxReceipt};

/// Read-only view of the PriceGuess contract
#[async_trait]
pub trait GuessReader: Send + Sync {
    async fn has_submitted(&self, account: Address) -> AgentResult<bool>;

    /// Zero handle when `account` never submitted
    async fn encrypted_guess_of(&self, account: Address) -> AgentResult<B256>;

    async fn last_guess_timestamp(&self, account: Address) -> AgentResult<u64>;
}

/// Signing side of the PriceGuess contract, bound to one wallet
#[async_trait]
pub trait GuessWriter: Send + Sync {
    /// Broadcast `submitPriceGuess` and return the transaction hash
    async fn submit_price_guess(&self, input: &EncryptedInput) -> AgentResult<B256>;

    /// Broadcast `allowDecryption` and return the transaction hash
    async fn allow_decryption(&self, grantee: Address) -> AgentResult<B256>;

    async fn wait_for_receipt(&self, tx_hash: B256) -> AgentResult<TxReceipt>;
}

/// Client side of the FHE input pipeline
#[async_trait]
pub trait Encryptor: Send + Sync {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> AgentResult<EncryptedInput>;
}

/// User decryption through the FHE gateway
#[async_trait]
pub trait Decryptor: Send + Sync {
    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        user: Address,
        authorization: &SignedAuthorization,
    ) -> AgentResult<HashMap<B256, u32>>;
}
