//! Mock FHE runtime
//!
//! Development stand-in for the external FHE stack: a coprocessor that mints
//! and verifies encrypted inputs and owns the ACL, and a gateway that serves
//! user decryption requests. Nothing here is real FHE.

pub mod coprocessor;
pub mod gateway;

use alloy_primitives::{Address, B256};
use thiserror::Error;

pub use coprocessor::{Coprocessor, EncryptedInput};
pub use gateway::Gateway;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FheError {
    #[error("Invalid input proof")]
    InvalidProof,

    #[error("Unknown ciphertext handle: {0}")]
    UnknownHandle(B256),

    #[error("{account} is not allowed on handle {handle}")]
    NotAllowed { handle: B256, account: Address },

    #[error("Invalid decryption signature: {0}")]
    InvalidSignature(String),

    #[error("Decryption authorization is not valid at this time")]
    AuthorizationExpired,

    #[error("Decryption authorization of {requested} days exceeds the {max} day limit")]
    AuthorizationTooLong { requested: u32, max: u32 },

    #[error("Contract {0} is not covered by the decryption authorization")]
    ContractNotAuthorized(Address),

    #[error("No handles requested")]
    EmptyRequest,
}

pub type FheResult<T> = Result<T, FheError>;
