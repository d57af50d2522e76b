//! JSON-RPC binding of the deployed PriceGuess contract
//!
//! Read-only. Submissions, grants and decryptions need the relayer and
//! gateway that share the dev node's coprocessor, so they stay on
//! [`crate::http::NodeClient`].

use alloy::{
    primitives::{Address, B256},
    providers::{Provider, ProviderBuilder, RootProvider},
    sol,
    transports::http::{reqwest::Url, Client, Http},
};
use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::error::{AgentError, AgentResult};
use crate::services::GuessReader;

sol! {
    #[sol(rpc)]
    interface IPriceGuess {
        event PriceGuessSubmitted(address indexed participant, uint256 timestamp);

        function submitPriceGuess(bytes32 encryptedValue, bytes calldata inputProof) external;
        function hasSubmitted(address account) external view returns (bool);
        function encryptedGuessOf(address account) external view returns (bytes32);
        function lastGuessTimestamp(address account) external view returns (uint256);
        function allowDecryption(address grantee) external;
    }
}

pub struct RpcGuessContract {
    provider: RootProvider<Http<Client>>,
    address: Address,
}

fn call_error(err: alloy::contract::Error) -> AgentError {
    AgentError::Transport(err.to_string())
}

impl RpcGuessContract {
    pub fn new(rpc_url: &str, address: Address) -> Result<Self> {
        let rpc_url: Url = rpc_url.parse().context("Invalid RPC URL")?;

        Ok(Self {
            provider: ProviderBuilder::new().on_http(rpc_url),
            address,
        })
    }

    pub async fn chain_id(&self) -> AgentResult<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| AgentError::Transport(e.to_string()))
    }
}

#[async_trait]
impl GuessReader for RpcGuessContract {
    async fn has_submitted(&self, account: Address) -> AgentResult<bool> {
        let contract = IPriceGuess::new(self.address, &self.provider);
        let result = contract.hasSubmitted(account).call().await.map_err(call_error)?;
        Ok(result._0)
    }

    async fn encrypted_guess_of(&self, account: Address) -> AgentResult<B256> {
        let contract = IPriceGuess::new(self.address, &self.provider);
        let result = contract
            .encryptedGuessOf(account)
            .call()
            .await
            .map_err(call_error)?;
        Ok(result._0)
    }

    async fn last_guess_timestamp(&self, account: Address) -> AgentResult<u64> {
        let contract = IPriceGuess::new(self.address, &self.provider);
        let result = contract
            .lastGuessTimestamp(account)
            .call()
            .await
            .map_err(call_error)?;
        result
            ._0
            .try_into()
            .map_err(|_| AgentError::Transport(format!("timestamp out of range: {}", result._0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use alloy::sol_types::{SolCall, SolValue};
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    const HANDLE: B256 = B256::new([0x42; 32]);
    const TIMESTAMP: u64 = 1_700_000_123;

    /// Minimal JSON-RPC endpoint answering the contract's view calls
    async fn answer(Json(request): Json<Value>) -> Json<Value> {
        let params = &request["params"][0];
        let result = match request["method"].as_str().unwrap_or_default() {
            "eth_chainId" => json!("0x7a69"),
            "eth_call" => {
                let input = params["input"]
                    .as_str()
                    .or(params["data"].as_str())
                    .unwrap_or_default();
                let selector = hex::decode(&input[2..10]).unwrap();
                let encoded = if selector == IPriceGuess::hasSubmittedCall::SELECTOR {
                    true.abi_encode()
                } else if selector == IPriceGuess::encryptedGuessOfCall::SELECTOR {
                    HANDLE.abi_encode()
                } else if selector == IPriceGuess::lastGuessTimestampCall::SELECTOR {
                    U256::from(TIMESTAMP).abi_encode()
                } else {
                    panic!("unexpected selector {:?}", selector);
                };
                json!(format!("0x{}", hex::encode(encoded)))
            }
            other => panic!("unexpected method {}", other),
        };

        Json(json!({ "jsonrpc": "2.0", "id": request["id"], "result": result }))
    }

    async fn spawn_rpc() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/", post(answer)))
                .await
                .unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_reads_decode_contract_views() {
        let url = spawn_rpc().await;
        let contract = RpcGuessContract::new(&url, Address::repeat_byte(0xc0)).unwrap();
        let account = Address::repeat_byte(0xa1);

        assert_eq!(contract.chain_id().await.unwrap(), 31337);
        assert!(contract.has_submitted(account).await.unwrap());
        assert_eq!(contract.encrypted_guess_of(account).await.unwrap(), HANDLE);
        assert_eq!(contract.last_guess_timestamp(account).await.unwrap(), TIMESTAMP);
    }

    #[tokio::test]
    async fn test_unreachable_rpc_is_a_transport_error() {
        let contract = RpcGuessContract::new("http://127.0.0.1:9", Address::ZERO).unwrap();
        assert!(matches!(
            contract.has_submitted(Address::ZERO).await,
            Err(AgentError::Transport(_))
        ));
    }

    #[test]
    fn test_invalid_url() {
        assert!(RpcGuessContract::new("not a url", Address::ZERO).is_err());
    }
}
