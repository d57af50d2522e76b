//! HTTP client for the price-guess dev node
//!
//! One client covers all four collaborator roles: contract views, signed
//! transactions, the relayer's input encryption and the decryption gateway.

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, AgentResult};
use crate::messages::{hex0x, personal_sign, transaction_message};
use crate::models::*;
use crate::services::{Decryptor, Encryptor, GuessReader, GuessWriter};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_POLL_ATTEMPTS: u32 = 120;

#[derive(Clone)]
pub struct NodeClient {
    client: Client,
    base_url: String,
    signer: Option<(Arc<PrivateKeySigner>, u64)>,
    poll_interval: Duration,
    poll_attempts: u32,
}

fn transaction_error(status: StatusCode, message: String) -> AgentError {
    match status {
        StatusCode::UNPROCESSABLE_ENTITY => AgentError::Reverted(message),
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::CONFLICT => {
            AgentError::Rejected(message)
        }
        _ => AgentError::Transport(format!("{}: {}", status, message)),
    }
}

fn decryption_error(status: StatusCode, message: String) -> AgentError {
    match status {
        StatusCode::UNAUTHORIZED => AgentError::Unauthorized(message),
        StatusCode::FORBIDDEN => AgentError::Forbidden(message),
        s if s.is_client_error() => AgentError::Decryption(message),
        _ => AgentError::Transport(format!("{}: {}", status, message)),
    }
}

fn encryption_error(status: StatusCode, message: String) -> AgentError {
    AgentError::Encryption(format!("{}: {}", status, message))
}

fn view_error(status: StatusCode, message: String) -> AgentError {
    AgentError::Transport(format!("{}: {}", status, message))
}

/// Decode a success body, or map the node's `{"error": ..}` body
async fn decode<T: DeserializeOwned>(
    resp: Response,
    on_error: fn(StatusCode, String) -> AgentError,
) -> AgentResult<T> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }

    let text = resp.text().await?;
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error)
        .unwrap_or(text);
    Err(on_error(status, message))
}

impl NodeClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            signer: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }

    /// Bind a wallet, enabling [`GuessWriter`]
    pub fn with_signer(mut self, signer: Arc<PrivateKeySigner>, chain_id: u64) -> Self {
        self.signer = Some((signer, chain_id));
        self
    }

    pub fn with_polling(mut self, interval: Duration, attempts: u32) -> Self {
        self.poll_interval = interval;
        self.poll_attempts = attempts;
        self
    }

    pub async fn health(&self) -> AgentResult<NodeHealth> {
        let resp = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        decode(resp, view_error).await
    }

    /// Submission events, optionally for one participant
    pub async fn events(&self, participant: Option<Address>) -> AgentResult<Vec<EventLog>> {
        let mut request = self
            .client
            .get(format!("{}/api/v1/contract/events", self.base_url));
        if let Some(participant) = participant {
            request = request.query(&[("participant", hex0x(participant))]);
        }
        decode(request.send().await?, view_error).await
    }

    async fn view<T: DeserializeOwned>(&self, view: &str, account: Address) -> AgentResult<T> {
        let url = format!(
            "{}/api/v1/contract/{}/{}",
            self.base_url,
            view,
            hex0x(account)
        );
        decode(self.client.get(&url).send().await?, view_error).await
    }

    async fn nonce(&self, account: Address) -> AgentResult<u64> {
        let url = format!("{}/api/v1/accounts/{}/nonce", self.base_url, hex0x(account));
        let resp: NonceResponse = decode(self.client.get(&url).send().await?, view_error).await?;
        Ok(resp.nonce)
    }

    async fn transact(&self, call: ContractCall) -> AgentResult<B256> {
        let (signer, chain_id) = self
            .signer
            .as_ref()
            .ok_or(AgentError::NotConnected("signer"))?;
        let from = signer.address();
        let nonce = self.nonce(from).await?;

        let message = transaction_message(*chain_id, from, nonce, &call);
        let tx = SignedTransaction {
            from,
            nonce,
            call,
            signature: personal_sign(signer, &message)?,
        };

        let resp = self
            .client
            .post(format!("{}/api/v1/transactions", self.base_url))
            .json(&tx)
            .send()
            .await?;
        let submitted: TransactionSubmitted = decode(resp, transaction_error).await?;

        tracing::debug!("Broadcast tx {} from {} (nonce {})", submitted.tx_hash, from, nonce);

        Ok(submitted.tx_hash)
    }
}

#[async_trait]
impl GuessReader for NodeClient {
    async fn has_submitted(&self, account: Address) -> AgentResult<bool> {
        let resp: HasSubmittedResponse = self.view("has-submitted", account).await?;
        Ok(resp.has_submitted)
    }

    async fn encrypted_guess_of(&self, account: Address) -> AgentResult<B256> {
        let resp: EncryptedGuessResponse = self.view("encrypted-guess", account).await?;
        Ok(resp.handle)
    }

    async fn last_guess_timestamp(&self, account: Address) -> AgentResult<u64> {
        let resp: LastGuessTimestampResponse = self.view("last-guess-timestamp", account).await?;
        Ok(resp.timestamp)
    }
}

#[async_trait]
impl GuessWriter for NodeClient {
    async fn submit_price_guess(&self, input: &EncryptedInput) -> AgentResult<B256> {
        self.transact(ContractCall::SubmitPriceGuess {
            encrypted_value: input.handle,
            proof: input.proof.clone(),
        })
        .await
    }

    async fn allow_decryption(&self, grantee: Address) -> AgentResult<B256> {
        self.transact(ContractCall::AllowDecryption { grantee }).await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> AgentResult<TxReceipt> {
        let url = format!(
            "{}/api/v1/transactions/{}/receipt",
            self.base_url,
            hex0x(tx_hash)
        );

        for _ in 0..self.poll_attempts {
            let resp = self.client.get(&url).send().await?;
            if resp.status() == StatusCode::NOT_FOUND {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let receipt: NodeReceipt = decode(resp, view_error).await?;
            return Ok(TxReceipt {
                tx_hash: receipt.tx_hash,
                block_number: receipt.block_number,
                success: receipt.status,
            });
        }

        Err(AgentError::Timeout(format!("receipt of {}", tx_hash)))
    }
}

#[async_trait]
impl Encryptor for NodeClient {
    async fn encrypt_u32(
        &self,
        contract: Address,
        user: Address,
        value: u32,
    ) -> AgentResult<EncryptedInput> {
        let resp = self
            .client
            .post(format!("{}/api/v1/relayer/input", self.base_url))
            .json(&EncryptInputRequest {
                contract,
                user,
                value,
            })
            .send()
            .await
            .map_err(|e| AgentError::Encryption(e.to_string()))?;
        decode(resp, encryption_error).await
    }
}

#[async_trait]
impl Decryptor for NodeClient {
    async fn user_decrypt(
        &self,
        pairs: &[HandleContractPair],
        user: Address,
        authorization: &SignedAuthorization,
    ) -> AgentResult<HashMap<B256, u32>> {
        let request = UserDecryptRequest {
            pairs,
            user,
            authorization: &authorization.authorization,
            signature: &authorization.signature,
        };
        let resp = self
            .client
            .post(format!("{}/api/v1/relayer/user-decrypt", self.base_url))
            .json(&request)
            .send()
            .await?;
        let decrypted: UserDecryptResponse = decode(resp, decryption_error).await?;

        Ok(decrypted
            .values
            .into_iter()
            .map(|v| (v.handle, v.value))
            .collect())
    }
}
