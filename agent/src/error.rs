//! Error types for the agent

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    #[error("Not connected: missing {0}")]
    NotConnected(&'static str),

    #[error("Connected account {account} does not match signer {signer}")]
    AccountMismatch { account: String, signer: String },

    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Contract revert, carrying the reason string verbatim
    #[error("{0}")]
    Reverted(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Transaction {0} reverted")]
    ReceiptFailed(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Decryption not authorized: {0}")]
    Unauthorized(String),

    #[error("Decryption denied: {0}")]
    Forbidden(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Signature cache error: {0}")]
    Cache(String),

    #[error("Network error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Transport(err.to_string())
    }
}

pub type AgentResult<T> = Result<T, AgentError>;
