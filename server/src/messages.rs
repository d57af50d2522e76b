//! Canonical messages signed by wallets
//!
//! Transactions and decryption authorizations are personal-signed (EIP-191)
//! text. The exact layout is part of the node's wire contract, clients must
//! reproduce it byte for byte.

use alloy_primitives::{Address, Signature};
use serde::{Deserialize, Serialize};

use crate::models::ContractCall;

/// User-decryption authorization covered by a single wallet signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionAuthorization {
    pub contracts: Vec<Address>,
    pub start_timestamp: i64,
    pub duration_days: u32,
}

impl DecryptionAuthorization {
    pub const SECONDS_PER_DAY: i64 = 86_400;

    /// Exclusive end of the validity window
    pub fn expires_at(&self) -> i64 {
        self.start_timestamp + i64::from(self.duration_days) * Self::SECONDS_PER_DAY
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        self.start_timestamp <= now && now < self.expires_at()
    }
}

/// Lowercase 0x-prefixed hex
pub fn hex0x(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn call_signature(call: &ContractCall) -> String {
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

/// Recover the address that personal-signed `message`
pub fn recover_signer(message: &str, signature: &[u8]) -> Result<Address, String> {
    let signature = Signature::try_from(signature).map_err(|e| e.to_string())?;
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use alloy_primitives::{Bytes, B256};

    const KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn test_transaction_message_layout() {
        let call = ContractCall::AllowDecryption {
            grantee: Address::repeat_byte(0xab),
        };
        let message = transaction_message(31337, Address::repeat_byte(0x01), 7, &call);

        assert_eq!(
            message,
            format!(
                "PriceGuess transaction\nchain: 31337\nfrom: 0x{}\nnonce: 7\ncall: allowDecryption(0x{})",
                "01".repeat(20),
                "ab".repeat(20)
            )
        );
    }

    #[test]
    fn test_submit_call_signature_is_lowercase_hex() {
        let call = ContractCall::SubmitPriceGuess {
            encrypted_value: B256::repeat_byte(0xCD),
            proof: Bytes::from(vec![0xEF, 0x01]),
        };
        assert_eq!(
            call_signature(&call),
            format!("submitPriceGuess(0x{},0xef01)", "cd".repeat(32))
        );
    }

    #[test]
    fn test_authorization_window() {
        let auth = DecryptionAuthorization {
            contracts: vec![],
            start_timestamp: 1_000,
            duration_days: 1,
        };
        assert!(!auth.is_valid_at(999));
        assert!(auth.is_valid_at(1_000));
        assert!(auth.is_valid_at(1_000 + 86_399));
        assert!(!auth.is_valid_at(1_000 + 86_400));
    }

    #[test]
    fn test_recover_signer() {
        let signer: PrivateKeySigner = KEY.parse().unwrap();
        let message = "PriceGuess user decryption";
        let signature = signer.sign_message_sync(message.as_bytes()).unwrap();

        let recovered = recover_signer(message, &signature.as_bytes()).unwrap();
        assert_eq!(recovered, signer.address());

        let other = recover_signer("something else", &signature.as_bytes()).unwrap();
        assert_ne!(other, signer.address());
    }

    #[test]
    fn test_recover_signer_rejects_garbage() {
        assert!(recover_signer("hello", &[0u8; 12]).is_err());
    }
}
