//! Messages the wallet personal-signs
//!
//! Must match the node byte for byte.

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::{Address, Bytes};

use crate::error::{AgentError, AgentResult};
use crate::models::{ContractCall, DecryptionAuthorization};

/// Lowercase 0x-prefixed hex
pub fn hex0x(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn call_signature(call: &ContractCall) -> String {
    match call {
        ContractCall::SubmitPriceGuess {
            encrypted_value,
            proof,
        } => format!("submitPriceGuess({},{})", hex0x(encrypted_value), hex0x(proof)),
        ContractCall::AllowDecryption { grantee } => {
            format!("allowDecryption({})", hex0x(grantee))
        }
    }
}

pub fn transaction_message(chain_id: u64, from: Address, nonce: u64, call: &ContractCall) -> String {
    format!(
        "PriceGuess transaction\nchain: {}\nfrom: {}\nnonce: {}\ncall: {}",
        chain_id,
        hex0x(from),
        nonce,
        call_signature(call)
    )
}

pub fn authorization_message(
    chain_id: u64,
    user: Address,
    authorization: &DecryptionAuthorization,
) -> String {
    let contracts = authorization
        .contracts
        .iter()
        .map(hex0x)
        .collect::<Vec<_>>()
        .join(",");

    format!(
        "PriceGuess user decryption\nchain: {}\nuser: {}\ncontracts: {}\nstart: {}\ndays: {}",
        chain_id,
        hex0x(user),
        contracts,
        authorization.start_timestamp,
        authorization.duration_days
    )
}

pub fn personal_sign(signer: &PrivateKeySigner, message: &str) -> AgentResult<Bytes> {
    let signature = signer
        .sign_message_sync(message.as_bytes())
        .map_err(|e| AgentError::Signing(e.to_string()))?;
    Ok(Bytes::from(signature.as_bytes().to_vec()))
}
