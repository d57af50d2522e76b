//! Development chain service
//!
//! Executes signed transactions against the PriceGuess contract, mining one
//! block per accepted transaction. Every transaction runs under the state
//! write lock, so verification and mutation form one atomic step and a
//! rejected call leaves no trace (no block, receipt, nonce bump or event).

use alloy_primitives::{keccak256, Address, B256};
use chrono::Utc;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::contract::{CallContext, ContractError, PriceGuess};
use crate::fhe::gateway::{DecryptedValue, HandleContractPair};
use crate::fhe::{Coprocessor, EncryptedInput, FheError, Gateway};
use crate::messages::{recover_signer, transaction_message, DecryptionAuthorization};
use crate::models::{ContractCall, EventLog, SignedTransaction, TransactionReceipt};

#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error(transparent)]
    Fhe(#[from] FheError),

    #[error("Invalid transaction signature: {0}")]
    InvalidSignature(String),

    #[error("Transaction signed by {signer}, not {from}")]
    SignerMismatch { signer: Address, from: Address },

    #[error("Nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },
}

struct ChainState {
    block_number: u64,
    block_timestamp: u64,
    contract: PriceGuess,
    coprocessor: Coprocessor,
    nonces: HashMap<Address, u64>,
    receipts: HashMap<B256, TransactionReceipt>,
    events: Vec<EventLog>,
}

/// Service for the in-process chain
pub struct ChainService {
    chain_id: u64,
    contract_address: Address,
    gateway: Gateway,
    state: RwLock<ChainState>,
}

impl ChainService {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let contract_address = config.contract_address()?;

        Ok(Self {
            chain_id: config.chain_id,
            contract_address,
            gateway: Gateway::new(config.chain_id, config.max_authorization_days),
            state: RwLock::new(ChainState {
                block_number: 0,
                block_timestamp: unix_now(),
                contract: PriceGuess::new(contract_address),
                coprocessor: Coprocessor::new(&config.coprocessor_seed, config.chain_id),
                nonces: HashMap::new(),
                receipts: HashMap::new(),
                events: Vec::new(),
            }),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub async fn block_number(&self) -> u64 {
        self.state.read().await.block_number
    }

    pub async fn has_submitted(&self, account: Address) -> bool {
        self.state.read().await.contract.has_submitted(account)
    }

    pub async fn encrypted_guess_of(&self, account: Address) -> B256 {
        self.state.read().await.contract.encrypted_guess_of(account)
    }

    pub async fn last_guess_timestamp(&self, account: Address) -> u64 {
        self.state.read().await.contract.last_guess_timestamp(account)
    }

    /// Next nonce `account` must use
    pub async fn nonce(&self, account: Address) -> u64 {
        self.state
            .read()
            .await
            .nonces
            .get(&account)
            .copied()
            .unwrap_or(0)
    }

    /// Validate, execute and mine `tx`
    pub async fn send_transaction(&self, tx: SignedTransaction) -> Result<B256, ChainError> {
        let message = transaction_message(self.chain_id, tx.from, tx.nonce, &tx.call);
        let signer = recover_signer(&message, &tx.signature).map_err(ChainError::InvalidSignature)?;
        if signer != tx.from {
            return Err(ChainError::SignerMismatch {
                signer,
                from: tx.from,
            });
        }

        let mut state = self.state.write().await;

        let expected = state.nonces.get(&tx.from).copied().unwrap_or(0);
        if tx.nonce != expected {
            return Err(ChainError::NonceMismatch {
                expected,
                got: tx.nonce,
            });
        }

        let timestamp = unix_now().max(state.block_timestamp + 1);
        let ctx = CallContext {
            sender: tx.from,
            timestamp,
        };

        let state = &mut *state;
        let events = match &tx.call {
            ContractCall::SubmitPriceGuess {
                encrypted_value,
                proof,
            } => {
                let event = state.contract.submit_price_guess(
                    &ctx,
                    &mut state.coprocessor,
                    *encrypted_value,
                    proof,
                )?;
                vec![event]
            }
            ContractCall::AllowDecryption { grantee } => {
                state
                    .contract
                    .allow_decryption(&ctx, &mut state.coprocessor, *grantee)?;
                Vec::new()
            }
        };

        // Mine
        state.block_number += 1;
        state.block_timestamp = timestamp;
        state.nonces.insert(tx.from, expected + 1);

        let mut preimage = message.into_bytes();
        preimage.extend_from_slice(&tx.signature);
        let tx_hash = keccak256(&preimage);

        for event in &events {
            state.events.push(EventLog {
                block_number: state.block_number,
                tx_hash,
                event: *event,
            });
        }

        state.receipts.insert(
            tx_hash,
            TransactionReceipt {
                tx_hash,
                from: tx.from,
                block_number: state.block_number,
                block_timestamp: timestamp,
                status: true,
                events,
            },
        );

        tracing::info!(
            "Mined block {}: {} from {} (tx={})",
            state.block_number,
            method_name(&tx.call),
            tx.from,
            tx_hash
        );

        Ok(tx_hash)
    }

    pub async fn receipt(&self, tx_hash: B256) -> Option<TransactionReceipt> {
        self.state.read().await.receipts.get(&tx_hash).cloned()
    }

    /// `PriceGuessSubmitted` log, optionally filtered by participant
    pub async fn events(&self, participant: Option<Address>) -> Vec<EventLog> {
        self.state
            .read()
            .await
            .events
            .iter()
            .filter(|log| participant.map_or(true, |p| log.event.participant == p))
            .copied()
            .collect()
    }

    /// Relayer step of the encryption subsystem
    pub async fn encrypt_input(&self, contract: Address, user: Address, value: u32) -> EncryptedInput {
        self.state
            .write()
            .await
            .coprocessor
            .encrypt_input(contract, user, value)
    }

    pub async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        user: Address,
        authorization: &DecryptionAuthorization,
        signature: &[u8],
    ) -> Result<Vec<DecryptedValue>, ChainError> {
        let state = self.state.read().await;
        let values = self.gateway.user_decrypt(
            &state.coprocessor,
            pairs,
            user,
            authorization,
            signature,
            Utc::now().timestamp(),
        )?;
        Ok(values)
    }
}

fn method_name(call: &ContractCall) -> &'static str {
    match call {
        ContractCall::SubmitPriceGuess { .. } => "submitPriceGuess",
        ContractCall::AllowDecryption { .. } => "allowDecryption",
    }
}

fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}
