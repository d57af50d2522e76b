//! Input registration, proof verification and ACL

use alloy_primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};

use super::{FheError, FheResult};

/// Encrypted-type tag stored in byte 30 of a handle
pub const EUINT32_TYPE: u8 = 4;
/// Handle layout version stored in byte 31
pub const HANDLE_VERSION: u8 = 0;

const HANDLE_DOMAIN: &[u8] = b"price-guess/input";
const PROOF_DOMAIN: &[u8] = b"price-guess/proof";
const KEYSTREAM_DOMAIN: &[u8] = b"price-guess/keystream";

/// Unverified inputs kept before the oldest is evicted
pub const DEFAULT_PENDING_LIMIT: usize = 4096;

/// Encrypted input as returned to the client: the external handle plus the
/// proof binding it to one (contract, user) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedInput {
    pub handle: B256,
    pub proof: Bytes,
}

#[derive(Debug, Clone)]
struct StoredCiphertext {
    masked: [u8; 4],
    contract: Address,
    user: Address,
}

pub struct Coprocessor {
    key: [u8; 32],
    chain_id: u64,
    minted: u64,
    ciphertexts: HashMap<B256, StoredCiphertext>,
    acl: HashMap<B256, HashSet<Address>>,
    /// Registration order of inputs not yet committed by a contract
    pending: VecDeque<B256>,
    pending_limit: usize,
}

impl Coprocessor {
    pub fn new(seed: &str, chain_id: u64) -> Self {
        Self {
            key: Sha256::digest(seed.as_bytes()).into(),
            chain_id,
            minted: 0,
            ciphertexts: HashMap::new(),
            acl: HashMap::new(),
            pending: VecDeque::new(),
            pending_limit: DEFAULT_PENDING_LIMIT,
        }
    }

    pub fn with_pending_limit(mut self, limit: usize) -> Self {
        self.pending_limit = limit.max(1);
        self
    }

    /// Encrypt `value` as an input destined for `contract`, submitted by `user`.
    /// The fresh handle has an empty ACL until a contract grants on it.
    pub fn encrypt_input(&mut self, contract: Address, user: Address, value: u32) -> EncryptedInput {
        let handle = self.mint_handle(contract, user);
        let masked = mask(value.to_be_bytes(), self.keystream(&handle));

        self.ciphertexts.insert(
            handle,
            StoredCiphertext {
                masked,
                contract,
                user,
            },
        );

        self.pending.push_back(handle);
        self.evict_pending();

        tracing::debug!("Registered encrypted input {}", handle);

        EncryptedInput {
            handle,
            proof: Bytes::from(self.proof_for(&handle, contract, user).to_vec()),
        }
    }

    /// Check that `proof` binds `handle` to `contract` and `user`
    pub fn verify_input(
        &self,
        handle: B256,
        proof: &[u8],
        contract: Address,
        user: Address,
    ) -> FheResult<B256> {
        let stored = self.ciphertexts.get(&handle).ok_or(FheError::InvalidProof)?;
        if stored.contract != contract || stored.user != user {
            return Err(FheError::InvalidProof);
        }
        if proof != self.proof_for(&handle, contract, user).as_slice() {
            return Err(FheError::InvalidProof);
        }
        Ok(handle)
    }

    /// Grant the target contract of a verified input access to it
    pub fn allow_this(&mut self, handle: B256, contract: Address) -> FheResult<()> {
        let stored = self
            .ciphertexts
            .get(&handle)
            .ok_or(FheError::UnknownHandle(handle))?;
        if stored.contract != contract {
            return Err(FheError::NotAllowed {
                handle,
                account: contract,
            });
        }
        self.acl.entry(handle).or_default().insert(contract);
        Ok(())
    }

    /// `granter` extends the ACL of `handle` with `account`. Only an account
    /// already on the ACL may grant.
    pub fn allow(&mut self, granter: Address, handle: B256, account: Address) -> FheResult<()> {
        if !self.ciphertexts.contains_key(&handle) {
            return Err(FheError::UnknownHandle(handle));
        }
        if !self.is_allowed(handle, granter) {
            return Err(FheError::NotAllowed {
                handle,
                account: granter,
            });
        }
        self.acl.entry(handle).or_default().insert(account);
        Ok(())
    }

    pub fn is_allowed(&self, handle: B256, account: Address) -> bool {
        self.acl
            .get(&handle)
            .is_some_and(|allowed| allowed.contains(&account))
    }

    /// Plaintext behind `handle`. Callers enforce the ACL.
    pub(crate) fn reveal(&self, handle: B256) -> FheResult<u32> {
        let stored = self
            .ciphertexts
            .get(&handle)
            .ok_or(FheError::UnknownHandle(handle))?;
        Ok(u32::from_be_bytes(mask(stored.masked, self.keystream(&handle))))
    }

    pub fn ciphertext_count(&self) -> usize {
        self.ciphertexts.len()
    }

    /// Drop the oldest inputs no contract has committed to
    fn evict_pending(&mut self) {
        while self.pending.len() > self.pending_limit {
            let Some(handle) = self.pending.pop_front() else {
                break;
            };
            if !self.acl.contains_key(&handle) {
                self.ciphertexts.remove(&handle);
                tracing::debug!("Evicted unverified input {}", handle);
            }
        }
    }

    fn mint_handle(&mut self, contract: Address, user: Address) -> B256 {
        self.minted += 1;

        let mut hasher = Sha256::new();
        hasher.update(HANDLE_DOMAIN);
        hasher.update(self.chain_id.to_be_bytes());
        hasher.update(contract);
        hasher.update(user);
        hasher.update(self.minted.to_be_bytes());

        let mut handle: [u8; 32] = hasher.finalize().into();
        handle[30] = EUINT32_TYPE;
        handle[31] = HANDLE_VERSION;
        B256::from(handle)
    }

    fn proof_for(&self, handle: &B256, contract: Address, user: Address) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(PROOF_DOMAIN);
        hasher.update(self.key);
        hasher.update(handle);
        hasher.update(contract);
        hasher.update(user);
        hasher.finalize().into()
    }

    fn keystream(&self, handle: &B256) -> [u8; 4] {
        let mut hasher = Sha256::new();
        hasher.update(KEYSTREAM_DOMAIN);
        hasher.update(self.key);
        hasher.update(handle);
        let digest = hasher.finalize();
        [digest[0], digest[1], digest[2], digest[3]]
    }
}

fn mask(bytes: [u8; 4], keystream: [u8; 4]) -> [u8; 4] {
    let mut out = bytes;
    for (b, k) in out.iter_mut().zip(keystream) {
        *b ^= k;
    }
    out
}
