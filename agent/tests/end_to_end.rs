//! Orchestrator flows against a live node on an ephemeral port

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::{Address, Bytes, B256};
use std::sync::Arc;
use std::time::Duration;

use price_guess_agent::{
    http::NodeClient, services::GuessReader, signature_cache::SignatureCache, AgentError,
    DecryptState, GuessOrchestrator, SessionContext, SessionState, TxOutcome,
};
use price_guess_agent::{messages as agent_messages, models as agent_models};
use price_guess_node::{
    app, config::Config, messages as node_messages, models as node_models,
    services::chain::ChainService, AppState,
};

const ALICE_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const BOB_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

struct Node {
    url: String,
    config: Config,
}

impl Node {
    async fn spawn() -> Self {
        let config = Config::default();
        let chain = ChainService::new(&config).unwrap();
        let router = app(AppState::new(chain));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            config,
        }
    }

    fn client(&self) -> NodeClient {
        NodeClient::new(&self.url).with_polling(Duration::from_millis(10), 100)
    }

    fn context(&self, key: &str) -> SessionContext {
        let signer = Arc::new(key.parse::<PrivateKeySigner>().unwrap());
        let chain_id = self.config.chain_id;
        let node = self.client();
        let writer = node.clone().with_signer(signer.clone(), chain_id);

        SessionContext {
            account: Some(signer.address()),
            chain_id: Some(chain_id),
            contract_address: Some(self.config.contract_address().unwrap()),
            signer: Some(signer),
            reader: Some(Arc::new(node.clone())),
            writer: Some(Arc::new(writer)),
            encryptor: Some(Arc::new(node.clone())),
            decryptor: Some(Arc::new(node)),
        }
    }

    fn orchestrator(&self, key: &str) -> GuessOrchestrator {
        GuessOrchestrator::new(&self.context(key), SignatureCache::in_memory(), 1)
    }
}

fn address_of(key: &str) -> Address {
    key.parse::<PrivateKeySigner>().unwrap().address()
}

#[tokio::test]
async fn test_health_reports_contract() {
    let node = Node::spawn().await;
    let health = node.client().health().await.unwrap();

    assert_eq!(health.status, "healthy");
    assert_eq!(health.chain_id, 31337);
    assert_eq!(health.contract, node.config.contract_address().unwrap());
}

#[tokio::test]
async fn test_guess_lifecycle() {
    let node = Node::spawn().await;
    let alice = node.orchestrator(ALICE_KEY);
    let bob = node.orchestrator(BOB_KEY);

    // fresh account
    assert_eq!(alice.refresh().await.unwrap(), B256::ZERO);
    assert!(!alice.has_submitted());

    // first guess
    let outcome = alice.submit_value("BTC", 2500).await;
    assert!(matches!(outcome, TxOutcome::Confirmed { block_number: 1, .. }));
    assert_eq!(alice.state(), SessionState::Idle);
    assert!(alice.has_submitted());
    assert_eq!(alice.decrypt().await, DecryptState::Decrypted(2500));

    // overwrite
    let first_handle = alice.handle().unwrap();
    alice.submit_value("BTC", 2700).await;
    assert_ne!(alice.handle(), Some(first_handle));
    assert_eq!(alice.decryption(), DecryptState::NotRequested);
    assert_eq!(alice.decrypt().await, DecryptState::Decrypted(2700));

    // bob has no access yet
    match bob.decrypt_delegated(address_of(ALICE_KEY)).await {
        DecryptState::Failed(reason) => assert!(reason.contains("denied"), "{}", reason),
        other => panic!("expected failure, got {:?}", other),
    }

    // grant, then retry
    let outcome = alice.grant_access(address_of(BOB_KEY)).await;
    assert!(matches!(outcome, TxOutcome::Confirmed { .. }));
    assert_eq!(
        bob.decrypt_delegated(address_of(ALICE_KEY)).await,
        DecryptState::Decrypted(2700)
    );

    // bob never submitted, so he cannot grant
    assert_eq!(
        bob.grant_access(address_of(ALICE_KEY)).await,
        TxOutcome::Failed(AgentError::Reverted("No guess submitted".to_string()))
    );
    assert!(bob.status().ends_with("No guess submitted"));

    let events = node.client().events(Some(address_of(ALICE_KEY))).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].timestamp < events[1].timestamp);
    assert!(node.client().events(Some(address_of(BOB_KEY))).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_boundary_values() {
    let node = Node::spawn().await;
    let alice = node.orchestrator(ALICE_KEY);

    alice.submit_value("BTC", 0).await;
    assert_eq!(alice.decrypt().await, DecryptState::Decrypted(0));

    alice.submit_value("BTC", u32::MAX).await;
    assert_eq!(alice.decrypt().await, DecryptState::Decrypted(u32::MAX));
}

#[tokio::test]
async fn test_account_switch_clears_session() {
    let node = Node::spawn().await;
    let orchestrator = node.orchestrator(ALICE_KEY);

    orchestrator.submit_value("BTC", 42).await;
    orchestrator.decrypt().await;
    assert!(orchestrator.value_decrypted());

    orchestrator.set_context(&node.context(BOB_KEY));
    assert!(!orchestrator.has_submitted());
    assert!(!orchestrator.value_decrypted());
    assert!(orchestrator.status().is_empty());

    // bob sees his own, empty, slot
    assert_eq!(orchestrator.refresh().await.unwrap(), B256::ZERO);
    assert_eq!(orchestrator.decrypt().await, DecryptState::NotRequested);

    // alice's guess is still on chain
    let reader = node.client();
    assert!(reader.has_submitted(address_of(ALICE_KEY)).await.unwrap());
    assert!(reader.last_guess_timestamp(address_of(ALICE_KEY)).await.unwrap() > 0);
}

#[test]
fn test_signed_messages_match_the_node() {
    let from = address_of(ALICE_KEY);
    let grantee = address_of(BOB_KEY);
    let handle = B256::new([0x5a; 32]);
    let proof = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]);

    assert_eq!(
        agent_messages::transaction_message(
            31337,
            from,
            7,
            &agent_models::ContractCall::SubmitPriceGuess {
                encrypted_value: handle,
                proof: proof.clone(),
            },
        ),
        node_messages::transaction_message(
            31337,
            from,
            7,
            &node_models::ContractCall::SubmitPriceGuess {
                encrypted_value: handle,
                proof,
            },
        )
    );
    assert_eq!(
        agent_messages::transaction_message(
            1,
            from,
            0,
            &agent_models::ContractCall::AllowDecryption { grantee },
        ),
        node_messages::transaction_message(
            1,
            from,
            0,
            &node_models::ContractCall::AllowDecryption { grantee },
        )
    );

    let contracts = vec![Address::new([0xc0; 20]), Address::new([0xc1; 20])];
    assert_eq!(
        agent_messages::authorization_message(
            31337,
            from,
            &agent_models::DecryptionAuthorization {
                contracts: contracts.clone(),
                start_timestamp: 1_700_000_000,
                duration_days: 30,
            },
        ),
        node_messages::authorization_message(
            31337,
            from,
            &node_messages::DecryptionAuthorization {
                contracts,
                start_timestamp: 1_700_000_000,
                duration_days: 30,
            },
        )
    );
}
