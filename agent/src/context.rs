//! Session context
//!
//! The capabilities a wallet connection injects. Everything is optional
//! until the connection is established; [`SessionContext::ready`] checks
//! that every field an operation needs is present.

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::Address;
use std::sync::Arc;

use crate::error::{AgentError, AgentResult};
use crate::services::{Decryptor, Encryptor, GuessReader, GuessWriter};

#[derive(Clone, Default)]
pub struct SessionContext {
    /// Connected account, must be the signer's address
    pub account: Option<Address>,
    /// Active chain
    pub chain_id: Option<u64>,
    /// Deployed PriceGuess contract on the active chain
    pub contract_address: Option<Address>,
    /// Signs transactions' companion messages and decryption authorizations
    pub signer: Option<Arc<PrivateKeySigner>>,
    /// Read-only provider
    pub reader: Option<Arc<dyn GuessReader>>,
    /// Signing provider
    pub writer: Option<Arc<dyn GuessWriter>>,
    pub encryptor: Option<Arc<dyn Encryptor>>,
    pub decryptor: Option<Arc<dyn Decryptor>>,
}

/// A [`SessionContext`] with every capability present
#[derive(Clone)]
pub struct ReadyContext {
    pub account: Address,
    pub chain_id: u64,
    pub contract_address: Address,
    pub signer: Arc<PrivateKeySigner>,
    pub reader: Arc<dyn GuessReader>,
    pub writer: Arc<dyn GuessWriter>,
    pub encryptor: Arc<dyn Encryptor>,
    pub decryptor: Arc<dyn Decryptor>,
}

impl SessionContext {
    /// The (account, chain) pair a session belongs to
    pub fn identity(&self) -> (Option<Address>, Option<u64>) {
        (self.account, self.chain_id)
    }

    pub fn ready(&self) -> AgentResult<ReadyContext> {
        let account = self.account.ok_or(AgentError::NotConnected("account"))?;
        let signer = self
            .signer
            .clone()
            .ok_or(AgentError::NotConnected("signer"))?;
        if signer.address() != account {
            return Err(AgentError::AccountMismatch {
                account: account.to_string(),
                signer: signer.address().to_string(),
            });
        }

        Ok(ReadyContext {
            account,
            chain_id: self.chain_id.ok_or(AgentError::NotConnected("chain id"))?,
            contract_address: self
                .contract_address
                .ok_or(AgentError::NotConnected("contract address"))?,
            signer,
            reader: self
                .reader
                .clone()
                .ok_or(AgentError::NotConnected("read provider"))?,
            writer: self
                .writer
                .clone()
                .ok_or(AgentError::NotConnected("signing provider"))?,
            encryptor: self
                .encryptor
                .clone()
                .ok_or(AgentError::NotConnected("encryption instance"))?,
            decryptor: self
                .decryptor
                .clone()
                .ok_or(AgentError::NotConnected("decryption instance"))?,
        })
    }
}
