//! Request orchestrator
//!
//! Sequences encrypt -> submit -> confirm -> refresh for one session and
//! serves decryption requests beside it.
//!
//! # Session model
//! - One submit or grant sequence at a time, guarded by a busy flag.
//!   Requests arriving while busy are dropped, not queued.
//! - [`SessionState`] moves only through [`SessionState::next`].
//! - Decryptions are cached by handle. Only successes are cached, so a
//!   failed decryption can be retried while a decrypted handle never goes
//!   back to the gateway.
//! - Switching account or chain starts a new epoch: status, handle and the
//!   decryption cache are cleared, and results of operations started in an
//!   older epoch are discarded.

use alloy_primitives::{Address, B256};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::context::{ReadyContext, SessionContext};
use crate::error::AgentError;
use crate::models::HandleContractPair;
use crate::signature_cache::SignatureCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Encrypting,
    Submitting,
    Confirming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    BeginSubmit,
    BeginGrant,
    Encrypted,
    Broadcast,
    Confirmed,
    Failed,
}

impl SessionState {
    /// Transition table. `None` marks an illegal transition.
    pub fn next(self, event: SessionEvent) -> Option<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        match (self, event) {
            (Idle, BeginSubmit) => Some(Encrypting),
            (Idle, BeginGrant) => Some(Submitting),
            (Encrypting, Encrypted) => Some(Submitting),
            (Submitting, Broadcast) => Some(Confirming),
            (Confirming, Confirmed) => Some(Idle),
            (Encrypting | Submitting | Confirming, Failed) => Some(Idle),
            _ => None,
        }
    }
}

/// Decryption result for one handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecryptState {
    NotRequested,
    Decrypted(u32),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Busy,
    NotConnected(AgentError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxOutcome {
    /// Nothing was attempted
    Dropped(DropReason),
    Confirmed { tx_hash: B256, block_number: u64 },
    Failed(AgentError),
    /// The session changed identity while the transaction was in flight
    Superseded,
}

struct Session {
    epoch: u64,
    identity: (Option<Address>, Option<u64>),
    state: SessionState,
    status: String,
    handle: Option<B256>,
    decryptions: HashMap<B256, DecryptState>,
    decrypting: HashSet<B256>,
}

impl Session {
    fn new(epoch: u64, identity: (Option<Address>, Option<u64>)) -> Self {
        Self {
            epoch,
            identity,
            state: SessionState::Idle,
            status: String::new(),
            handle: None,
            decryptions: HashMap::new(),
            decrypting: HashSet::new(),
        }
    }

    fn fire(&mut self, event: SessionEvent, status: String) {
        match self.state.next(event) {
            Some(next) => self.state = next,
            None => {
                tracing::error!("Illegal transition {:?} on {:?}", event, self.state);
                self.state = SessionState::Idle;
            }
        }
        self.status = status;
    }
}

/// Clears the busy flag on every exit path
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct GuessOrchestrator {
    context: Mutex<SessionContext>,
    session: Mutex<Session>,
    signatures: Mutex<SignatureCache>,
    authorization_days: u32,
    busy: AtomicBool,
}

impl GuessOrchestrator {
    pub fn new(context: &SessionContext, signatures: SignatureCache, authorization_days: u32) -> Self {
        Self {
            context: Mutex::new(context.clone()),
            session: Mutex::new(Session::new(0, context.identity())),
            signatures: Mutex::new(signatures),
            authorization_days,
            busy: AtomicBool::new(false),
        }
    }

    /// Replace the injected capabilities. A different account or chain
    /// starts a fresh session.
    pub fn set_context(&self, context: &SessionContext) {
        // lock order: context, then session
        let mut current = self.context.lock();
        *current = context.clone();

        let mut session = self.session.lock();
        if session.identity != context.identity() {
            tracing::info!("Identity changed, resetting session");
            *session = Session::new(session.epoch + 1, context.identity());
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.lock().state
    }

    pub fn status(&self) -> String {
        self.session.lock().status.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Last handle read for the current account
    pub fn handle(&self) -> Option<B256> {
        self.session.lock().handle
    }

    /// True once a non-zero handle is stored for the current account
    pub fn has_submitted(&self) -> bool {
        self.handle().is_some_and(|handle| handle != B256::ZERO)
    }

    /// Decryption state of the current account's handle
    pub fn decryption(&self) -> DecryptState {
        let session = self.session.lock();
        match session.handle {
            Some(handle) if handle != B256::ZERO => session
                .decryptions
                .get(&handle)
                .cloned()
                .unwrap_or(DecryptState::NotRequested),
            _ => DecryptState::NotRequested,
        }
    }

    pub fn value_decrypted(&self) -> bool {
        matches!(self.decryption(), DecryptState::Decrypted(_))
    }

    /// The ready context together with the epoch it belongs to
    fn ready(&self) -> Result<(ReadyContext, u64), AgentError> {
        let context = self.context.lock();
        let ready = context.ready()?;
        let epoch = self.session.lock().epoch;
        Ok((ready, epoch))
    }

    /// Apply `update` unless the session moved to a newer epoch
    fn with_session(&self, epoch: u64, update: impl FnOnce(&mut Session)) -> bool {
        let mut session = self.session.lock();
        if session.epoch != epoch {
            return false;
        }
        update(&mut session);
        true
    }

    fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(&self.busy))
    }

    /// Re-read the current account's handle
    pub async fn refresh(&self) -> Result<B256, AgentError> {
        let (ctx, epoch) = self.ready()?;
        let handle = ctx.reader.encrypted_guess_of(ctx.account).await?;
        self.with_session(epoch, |s| s.handle = Some(handle));
        Ok(handle)
    }

    /// Encrypt `amount`, submit it and wait for confirmation.
    /// `label` only appears in status text.
    pub async fn submit_value(&self, label: &str, amount: u32) -> TxOutcome {
        let (ctx, epoch) = match self.ready() {
            Ok(ready) => ready,
            Err(e) => return TxOutcome::Dropped(DropReason::NotConnected(e)),
        };
        let Some(_busy) = self.try_begin() else {
            tracing::debug!("Submission of {} dropped: busy", label);
            return TxOutcome::Dropped(DropReason::Busy);
        };

        if !self.with_session(epoch, |s| {
            s.fire(SessionEvent::BeginSubmit, format!("Encrypting {}...", label))
        }) {
            return TxOutcome::Superseded;
        }

        let input = match ctx
            .encryptor
            .encrypt_u32(ctx.contract_address, ctx.account, amount)
            .await
        {
            Ok(input) => input,
            Err(e) => return self.fail(epoch, label, e),
        };

        if !self.with_session(epoch, |s| {
            s.fire(SessionEvent::Encrypted, format!("Submitting {}...", label))
        }) {
            return TxOutcome::Superseded;
        }

        let tx_hash = match ctx.writer.submit_price_guess(&input).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => return self.fail(epoch, label, e),
        };

        self.confirm(&ctx, epoch, label, tx_hash).await
    }

    /// Let `grantee` decrypt the current account's guess
    pub async fn grant_access(&self, grantee: Address) -> TxOutcome {
        let label = format!("access for {}", grantee);
        let (ctx, epoch) = match self.ready() {
            Ok(ready) => ready,
            Err(e) => return TxOutcome::Dropped(DropReason::NotConnected(e)),
        };
        let Some(_busy) = self.try_begin() else {
            return TxOutcome::Dropped(DropReason::Busy);
        };

        if !self.with_session(epoch, |s| {
            s.fire(SessionEvent::BeginGrant, format!("Granting {}...", label))
        }) {
            return TxOutcome::Superseded;
        }

        let tx_hash = match ctx.writer.allow_decryption(grantee).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => return self.fail(epoch, &label, e),
        };

        self.confirm(&ctx, epoch, &label, tx_hash).await
    }

    async fn confirm(&self, ctx: &ReadyContext, epoch: u64, label: &str, tx_hash: B256) -> TxOutcome {
        if !self.with_session(epoch, |s| {
            s.fire(
                SessionEvent::Broadcast,
                format!("Waiting for confirmation of {}...", tx_hash),
            )
        }) {
            return TxOutcome::Superseded;
        }

        let receipt = match ctx.writer.wait_for_receipt(tx_hash).await {
            Ok(receipt) if receipt.success => receipt,
            Ok(_) => return self.fail(epoch, label, AgentError::ReceiptFailed(tx_hash.to_string())),
            Err(e) => return self.fail(epoch, label, e),
        };

        // read-after-write
        let refreshed = ctx.reader.encrypted_guess_of(ctx.account).await;

        let applied = self.with_session(epoch, |s| {
            let status = match &refreshed {
                Ok(handle) => {
                    s.handle = Some(*handle);
                    format!("{} confirmed in block {}", label, receipt.block_number)
                }
                Err(e) => format!(
                    "{} confirmed in block {}, refresh failed: {}",
                    label, receipt.block_number, e
                ),
            };
            s.fire(SessionEvent::Confirmed, status);
        });
        if !applied {
            return TxOutcome::Superseded;
        }

        tracing::info!("{} confirmed: tx={}", label, tx_hash);

        TxOutcome::Confirmed {
            tx_hash,
            block_number: receipt.block_number,
        }
    }

    fn fail(&self, epoch: u64, label: &str, err: AgentError) -> TxOutcome {
        tracing::warn!("{} failed: {}", label, err);
        let applied = self.with_session(epoch, |s| {
            s.fire(SessionEvent::Failed, format!("Failed to submit {}: {}", label, err))
        });
        if applied {
            TxOutcome::Failed(err)
        } else {
            TxOutcome::Superseded
        }
    }

    /// Decrypt the current account's guess
    pub async fn decrypt(&self) -> DecryptState {
        let Some(handle) = self.handle().filter(|h| *h != B256::ZERO) else {
            return DecryptState::NotRequested;
        };
        self.decrypt_handle(handle).await
    }

    /// Decrypt `owner`'s guess as the current account. Works once `owner`
    /// has granted this account access.
    pub async fn decrypt_delegated(&self, owner: Address) -> DecryptState {
        let (ctx, epoch) = match self.ready() {
            Ok(ready) => ready,
            Err(_) => return DecryptState::NotRequested,
        };
        let handle = match ctx.reader.encrypted_guess_of(owner).await {
            Ok(handle) => handle,
            Err(e) => {
                self.with_session(epoch, |s| s.status = format!("Failed to read guess of {}: {}", owner, e));
                return DecryptState::Failed(e.to_string());
            }
        };
        if handle == B256::ZERO {
            self.with_session(epoch, |s| s.status = format!("{} has not submitted a guess", owner));
            return DecryptState::NotRequested;
        }
        self.decrypt_handle(handle).await
    }

    async fn decrypt_handle(&self, handle: B256) -> DecryptState {
        let (ctx, epoch) = match self.ready() {
            Ok(ready) => ready,
            Err(_) => return DecryptState::NotRequested,
        };

        {
            let mut session = self.session.lock();
            if let Some(done @ DecryptState::Decrypted(_)) = session.decryptions.get(&handle) {
                return done.clone();
            }
            if self.is_busy() || !session.decrypting.insert(handle) {
                return session
                    .decryptions
                    .get(&handle)
                    .cloned()
                    .unwrap_or(DecryptState::NotRequested);
            }
            session.status = "Decrypting...".to_string();
        }

        let result = self.request_decryption(&ctx, handle).await;

        let state = match result {
            Ok(value) => DecryptState::Decrypted(value),
            Err(e) => {
                tracing::warn!("Decryption of {} failed: {}", handle, e);
                if matches!(e, AgentError::Unauthorized(_)) {
                    if let Err(cache_err) = self
                        .signatures
                        .lock()
                        .invalidate(ctx.account, ctx.chain_id, ctx.contract_address)
                    {
                        tracing::warn!("{}", cache_err);
                    }
                }
                DecryptState::Failed(e.to_string())
            }
        };

        let applied = self.with_session(epoch, |s| {
            s.decrypting.remove(&handle);
            s.status = match &state {
                DecryptState::Decrypted(_) => "Decrypted".to_string(),
                DecryptState::Failed(reason) => format!("Decryption failed: {}", reason),
                DecryptState::NotRequested => String::new(),
            };
            s.decryptions.insert(handle, state.clone());
        });

        if applied {
            state
        } else {
            DecryptState::NotRequested
        }
    }

    async fn request_decryption(&self, ctx: &ReadyContext, handle: B256) -> Result<u32, AgentError> {
        let authorization = self.signatures.lock().get_or_sign(
            &ctx.signer,
            ctx.chain_id,
            ctx.contract_address,
            self.authorization_days,
            Utc::now().timestamp(),
        )?;

        let pair = HandleContractPair {
            handle,
            contract: ctx.contract_address,
        };
        let values = ctx
            .decryptor
            .user_decrypt(&[pair], ctx.account, &authorization)
            .await?;

        values
            .get(&handle)
            .copied()
            .ok_or_else(|| AgentError::Decryption(format!("no value returned for {}", handle)))
    }
}
