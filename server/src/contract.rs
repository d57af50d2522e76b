//! PriceGuess contract
//!
//! Address-scoped storage of one encrypted guess per participant. The
//! contract never sees plaintext: it stores the handle returned by input
//! verification and delegates all access control to the coprocessor ACL.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::fhe::{Coprocessor, FheError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("No guess submitted")]
    NoGuessSubmitted,

    #[error(transparent)]
    Fhe(#[from] FheError),
}

/// `msg.sender` and `block.timestamp` of the executing call
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    pub sender: Address,
    pub timestamp: u64,
}

/// `PriceGuessSubmitted(address participant, uint256 timestamp)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceGuessSubmitted {
    pub participant: Address,
    pub timestamp: u64,
}

pub struct PriceGuess {
    address: Address,
    encrypted_guesses: HashMap<Address, B256>,
    has_submitted: HashMap<Address, bool>,
    last_guess_timestamp: HashMap<Address, u64>,
}

impl PriceGuess {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            encrypted_guesses: HashMap::new(),
            has_submitted: HashMap::new(),
            last_guess_timestamp: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Store the caller's encrypted guess, replacing any previous one.
    ///
    /// Fails without touching state when the proof does not verify.
    pub fn submit_price_guess(
        &mut self,
        ctx: &CallContext,
        fhe: &mut Coprocessor,
        encrypted_value: B256,
        proof: &[u8],
    ) -> Result<PriceGuessSubmitted, ContractError> {
        let handle = fhe.verify_input(encrypted_value, proof, self.address, ctx.sender)?;

        // cannot fail once the input verified against this contract
        fhe.allow_this(handle, self.address)?;
        fhe.allow(self.address, handle, ctx.sender)?;

        self.encrypted_guesses.insert(ctx.sender, handle);
        self.has_submitted.insert(ctx.sender, true);
        self.last_guess_timestamp.insert(ctx.sender, ctx.timestamp);

        Ok(PriceGuessSubmitted {
            participant: ctx.sender,
            timestamp: ctx.timestamp,
        })
    }

    pub fn has_submitted(&self, account: Address) -> bool {
        self.has_submitted.get(&account).copied().unwrap_or(false)
    }

    /// Zero handle when `account` never submitted
    pub fn encrypted_guess_of(&self, account: Address) -> B256 {
        self.encrypted_guesses
            .get(&account)
            .copied()
            .unwrap_or(B256::ZERO)
    }

    pub fn last_guess_timestamp(&self, account: Address) -> u64 {
        self.last_guess_timestamp
            .get(&account)
            .copied()
            .unwrap_or(0)
    }

    /// Let `grantee` decrypt the caller's current guess
    pub fn allow_decryption(
        &mut self,
        ctx: &CallContext,
        fhe: &mut Coprocessor,
        grantee: Address,
    ) -> Result<(), ContractError> {
        if !self.has_submitted(ctx.sender) {
            return Err(ContractError::NoGuessSubmitted);
        }
        let handle = self.encrypted_guess_of(ctx.sender);
        fhe.allow(self.address, handle, grantee)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: Address = Address::new([0xc0; 20]);

    fn at(sender: Address, timestamp: u64) -> CallContext {
        CallContext { sender, timestamp }
    }

    fn setup() -> (PriceGuess, Coprocessor) {
        (PriceGuess::new(CONTRACT), Coprocessor::new("seed", 31337))
    }

    #[test]
    fn test_unknown_address_reads_defaults() {
        let (contract, _) = setup();
        let nobody = Address::repeat_byte(0x99);

        assert!(!contract.has_submitted(nobody));
        assert_eq!(contract.encrypted_guess_of(nobody), B256::ZERO);
        assert_eq!(contract.last_guess_timestamp(nobody), 0);
    }

    #[test]
    fn test_submit_stores_handle_and_grants_access() {
        let (mut contract, mut fhe) = setup();
        let alice = Address::repeat_byte(0xa1);
        let input = fhe.encrypt_input(CONTRACT, alice, 2500);

        let event = contract
            .submit_price_guess(&at(alice, 100), &mut fhe, input.handle, &input.proof)
            .unwrap();

        assert_eq!(
            event,
            PriceGuessSubmitted {
                participant: alice,
                timestamp: 100
            }
        );
        assert!(contract.has_submitted(alice));
        assert_eq!(contract.encrypted_guess_of(alice), input.handle);
        assert_eq!(contract.last_guess_timestamp(alice), 100);
        assert!(fhe.is_allowed(input.handle, alice));
        assert!(fhe.is_allowed(input.handle, CONTRACT));
        assert_eq!(fhe.reveal(input.handle).unwrap(), 2500);
    }

    #[test]
    fn test_resubmission_overwrites() {
        let (mut contract, mut fhe) = setup();
        let alice = Address::repeat_byte(0xa1);

        let first = fhe.encrypt_input(CONTRACT, alice, 2500);
        contract
            .submit_price_guess(&at(alice, 100), &mut fhe, first.handle, &first.proof)
            .unwrap();
        let second = fhe.encrypt_input(CONTRACT, alice, 2700);
        contract
            .submit_price_guess(&at(alice, 200), &mut fhe, second.handle, &second.proof)
            .unwrap();

        assert!(contract.has_submitted(alice));
        assert_eq!(contract.encrypted_guess_of(alice), second.handle);
        assert_eq!(contract.last_guess_timestamp(alice), 200);
        assert_eq!(fhe.reveal(contract.encrypted_guess_of(alice)).unwrap(), 2700);
    }

    #[test]
    fn test_invalid_proof_leaves_state_untouched() {
        let (mut contract, mut fhe) = setup();
        let alice = Address::repeat_byte(0xa1);
        let input = fhe.encrypt_input(CONTRACT, alice, 1);

        let result =
            contract.submit_price_guess(&at(alice, 100), &mut fhe, input.handle, &[0u8; 32]);

        assert_eq!(result, Err(ContractError::Fhe(FheError::InvalidProof)));
        assert!(!contract.has_submitted(alice));
        assert_eq!(contract.encrypted_guess_of(alice), B256::ZERO);
        assert_eq!(contract.last_guess_timestamp(alice), 0);
        assert!(!fhe.is_allowed(input.handle, alice));
        assert!(!fhe.is_allowed(input.handle, CONTRACT));
    }

    #[test]
    fn test_input_encrypted_for_someone_else_is_rejected() {
        let (mut contract, mut fhe) = setup();
        let alice = Address::repeat_byte(0xa1);
        let mallory = Address::repeat_byte(0x66);
        let input = fhe.encrypt_input(CONTRACT, alice, 1);

        let result =
            contract.submit_price_guess(&at(mallory, 100), &mut fhe, input.handle, &input.proof);

        assert_eq!(result, Err(ContractError::Fhe(FheError::InvalidProof)));
        assert!(!contract.has_submitted(mallory));
    }

    #[test]
    fn test_allow_decryption_requires_submission() {
        let (mut contract, mut fhe) = setup();
        let bob = Address::repeat_byte(0xb0);

        let result = contract.allow_decryption(&at(bob, 100), &mut fhe, Address::repeat_byte(1));

        assert_eq!(result, Err(ContractError::NoGuessSubmitted));
        assert_eq!(result.unwrap_err().to_string(), "No guess submitted");
        assert!(!contract.has_submitted(bob));
    }

    #[test]
    fn test_allow_decryption_extends_current_handle() {
        let (mut contract, mut fhe) = setup();
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);

        let old = fhe.encrypt_input(CONTRACT, alice, 2500);
        contract
            .submit_price_guess(&at(alice, 100), &mut fhe, old.handle, &old.proof)
            .unwrap();
        let current = fhe.encrypt_input(CONTRACT, alice, 2700);
        contract
            .submit_price_guess(&at(alice, 200), &mut fhe, current.handle, &current.proof)
            .unwrap();

        contract.allow_decryption(&at(alice, 300), &mut fhe, bob).unwrap();
        contract.allow_decryption(&at(alice, 301), &mut fhe, bob).unwrap();

        assert!(fhe.is_allowed(current.handle, bob));
        assert!(!fhe.is_allowed(old.handle, bob));
    }
}
