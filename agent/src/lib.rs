//! PriceGuess client
//!
//! Encrypts price guesses, submits them to the PriceGuess contract and
//! decrypts them again through the FHE gateway, one request at a time.

pub mod context;
pub mod error;
pub mod http;
pub mod messages;
pub mod models;
pub mod orchestrator;
pub mod rpc;
pub mod services;
pub mod signature_cache;

pub use context::SessionContext;
pub use error::{AgentError, AgentResult};
pub use orchestrator::{DecryptState, GuessOrchestrator, SessionState, TxOutcome};
