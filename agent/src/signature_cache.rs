//! Decryption signature cache
//!
//! One signed [`DecryptionAuthorization`] per (signer, chain, contract), reused
//! until its validity window closes so the wallet is prompted once. Backed
//! by a JSON file when opened with a path.

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::Address;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AgentError, AgentResult};
use crate::messages::{authorization_message, hex0x, personal_sign};
use crate::models::{DecryptionAuthorization, SignedAuthorization};

/// Refuse to reuse an authorization this close to expiry
const EXPIRY_MARGIN_SECS: i64 = 60;

pub struct SignatureCache {
    path: Option<PathBuf>,
    entries: HashMap<String, SignedAuthorization>,
}

fn cache_key(signer: Address, chain_id: u64, contract: Address) -> String {
    format!("{}:{}:{}", hex0x(signer), chain_id, hex0x(contract))
}

impl SignatureCache {
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: HashMap::new(),
        }
    }

    /// Load the cache at `path`, starting empty when the file does not exist
    pub fn open(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| AgentError::Cache(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(AgentError::Cache(format!("{}: {}", path.display(), e))),
        };

        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached authorization still usable at `now`. Stale entries are evicted.
    pub fn get(
        &mut self,
        signer: Address,
        chain_id: u64,
        contract: Address,
        now: i64,
    ) -> AgentResult<Option<SignedAuthorization>> {
        let key = cache_key(signer, chain_id, contract);
        match self.entries.get(&key) {
            Some(entry) if entry.authorization.is_valid_at(now + EXPIRY_MARGIN_SECS) => {
                Ok(Some(entry.clone()))
            }
            Some(_) => {
                self.entries.remove(&key);
                self.persist()?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Cached authorization, or a freshly signed one valid for `duration_days`
    pub fn get_or_sign(
        &mut self,
        signer: &PrivateKeySigner,
        chain_id: u64,
        contract: Address,
        duration_days: u32,
        now: i64,
    ) -> AgentResult<SignedAuthorization> {
        if let Some(cached) = self.get(signer.address(), chain_id, contract, now)? {
            return Ok(cached);
        }

        let authorization = DecryptionAuthorization {
            contracts: vec![contract],
            start_timestamp: now,
            duration_days,
        };
        let message = authorization_message(chain_id, signer.address(), &authorization);
        let signed = SignedAuthorization {
            authorization,
            signature: personal_sign(signer, &message)?,
        };

        tracing::debug!("Signed decryption authorization for {}", contract);

        self.entries
            .insert(cache_key(signer.address(), chain_id, contract), signed.clone());
        self.persist()?;
        Ok(signed)
    }

    /// Drop the entry for (signer, chain, contract), e.g. after the gateway refused it
    pub fn invalidate(&mut self, signer: Address, chain_id: u64, contract: Address) -> AgentResult<()> {
        if self.entries.remove(&cache_key(signer, chain_id, contract)).is_some() {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&self) -> AgentResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AgentError::Cache(format!("{}: {}", parent.display(), e)))?;
        }
        let raw = serde_json::to_vec_pretty(&self.entries)
            .map_err(|e| AgentError::Cache(e.to_string()))?;
        std::fs::write(path, raw).map_err(|e| AgentError::Cache(format!("{}: {}", path.display(), e)))
    }
}
