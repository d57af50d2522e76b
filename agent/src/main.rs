//! PriceGuess agent
//!
//! Command-line front end for the request orchestrator:
//! 1. Encrypt and submit a price guess
//! 2. Inspect the stored ciphertext handle
//! 3. Decrypt your own guess, or one shared with you
//! 4. Grant another account decryption rights

use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use price_guess_agent::{
    http::NodeClient,
    orchestrator::DropReason,
    rpc::RpcGuessContract,
    signature_cache::SignatureCache,
    DecryptState, GuessOrchestrator, SessionContext, TxOutcome,
};

#[derive(Parser)]
#[command(name = "agent")]
#[command(about = "Submit and decrypt encrypted price guesses")]
struct Cli {
    /// Node URL serving the relayer and decryption gateway
    #[arg(long, env = "PRICE_GUESS_NODE", default_value = "http://localhost:8545")]
    node: String,

    /// EVM JSON-RPC endpoint for `status`. Other commands need the dev node
    #[arg(long, env = "RPC_URL")]
    rpc_url: Option<String>,

    /// Wallet private key
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// PriceGuess contract address (defaults to the node's)
    #[arg(long, env = "CONTRACT_ADDRESS")]
    contract: Option<Address>,

    /// Chain id (defaults to the node's or the RPC's)
    #[arg(long)]
    chain_id: Option<u64>,

    /// Where decryption authorizations are cached
    #[arg(long, default_value = ".price-guess/signatures.json")]
    signature_cache: PathBuf,

    /// Validity of a new decryption authorization
    #[arg(long, default_value = "1")]
    authorization_days: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt and submit a price guess
    Submit {
        /// Guessed price
        #[arg(short = 'n', long)]
        amount: u32,

        /// Asset label shown in status messages
        #[arg(short, long, default_value = "price")]
        label: String,
    },

    /// Show the stored guess of an account
    Status {
        /// Account (defaults to the wallet's)
        #[arg(short, long)]
        address: Option<Address>,
    },

    /// Decrypt a stored guess
    Decrypt {
        /// Decrypt this account's guess instead of your own
        #[arg(short, long)]
        owner: Option<Address>,
    },

    /// Allow another account to decrypt your guess
    Allow {
        #[arg(short, long)]
        grantee: Address,
    },

    /// List submission events
    Events {
        #[arg(short, long)]
        participant: Option<Address>,
    },
}

async fn build_context(cli: &Cli, node: &NodeClient) -> Result<SessionContext> {
    let signer = cli
        .private_key
        .as_deref()
        .map(|pk| pk.parse::<PrivateKeySigner>())
        .transpose()
        .context("Invalid private key")?
        .map(Arc::new);

    let (mut chain_id, mut contract) = (cli.chain_id, cli.contract);
    if chain_id.is_none() || contract.is_none() {
        let health = node.health().await.context("Node unreachable")?;
        contract = contract.or(Some(health.contract));
        if cli.rpc_url.is_none() {
            chain_id = chain_id.or(Some(health.chain_id));
        }
    }
    let contract_address = contract.context("No contract address")?;

    let mut ctx = SessionContext {
        account: signer.as_ref().map(|s| s.address()),
        contract_address: Some(contract_address),
        signer: signer.clone(),
        encryptor: Some(Arc::new(node.clone())),
        decryptor: Some(Arc::new(node.clone())),
        ..Default::default()
    };

    match &cli.rpc_url {
        Some(rpc_url) => {
            let rpc = RpcGuessContract::new(rpc_url, contract_address)?;
            if chain_id.is_none() {
                chain_id = Some(rpc.chain_id().await?);
            }
            ctx.reader = Some(Arc::new(rpc));
        }
        None => {
            let chain_id = chain_id.context("No chain id")?;
            let writer = match &signer {
                Some(signer) => node.clone().with_signer(signer.clone(), chain_id),
                None => node.clone(),
            };
            ctx.reader = Some(Arc::new(node.clone()));
            ctx.writer = Some(Arc::new(writer));
        }
    }
    ctx.chain_id = chain_id;

    Ok(ctx)
}

fn print_decryption(state: DecryptState) -> Result<()> {
    match state {
        DecryptState::Decrypted(value) => println!("Decrypted guess: {}", value),
        DecryptState::NotRequested => println!("Nothing to decrypt"),
        DecryptState::Failed(reason) => anyhow::bail!("Decryption failed: {}", reason),
    }
    Ok(())
}

fn print_outcome(outcome: TxOutcome, status: String) -> Result<()> {
    match outcome {
        TxOutcome::Confirmed {
            tx_hash,
            block_number,
        } => {
            println!("[$] {}", status);
            println!("    TX Hash: {}", tx_hash);
            println!("    Block:   {}", block_number);
            Ok(())
        }
        TxOutcome::Dropped(DropReason::NotConnected(e)) => Err(e.into()),
        TxOutcome::Dropped(DropReason::Busy) => anyhow::bail!("Another request is in flight"),
        TxOutcome::Failed(e) => Err(anyhow::Error::new(e).context(status)),
        TxOutcome::Superseded => anyhow::bail!("Session changed before confirmation"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "price_guess_agent=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.rpc_url.is_some() && !matches!(cli.command, Commands::Status { .. }) {
        anyhow::bail!("--rpc-url only serves `status`; this command needs the dev node");
    }
    let node = NodeClient::new(&cli.node);
    let ctx = build_context(&cli, &node).await?;

    let signatures = SignatureCache::open(&cli.signature_cache)?;
    let orchestrator = GuessOrchestrator::new(&ctx, signatures, cli.authorization_days);

    match cli.command {
        Commands::Submit { amount, label } => {
            println!("[*] Submitting encrypted {} guess", label);
            let outcome = orchestrator.submit_value(&label, amount).await;
            print_outcome(outcome, orchestrator.status())?;
            if let Some(handle) = orchestrator.handle() {
                println!("    Handle:  {}", handle);
            }
        }

        Commands::Status { address } => {
            let account = address
                .or(ctx.account)
                .context("No address given and no wallet configured")?;
            let reader = ctx.reader.as_ref().context("No read provider")?;

            let submitted = reader.has_submitted(account).await?;
            println!("Account:        {}", account);
            println!("Submitted:      {}", submitted);
            if submitted {
                let handle = reader.encrypted_guess_of(account).await?;
                let timestamp = reader.last_guess_timestamp(account).await?;
                let when = chrono::DateTime::<chrono::Utc>::from_timestamp(timestamp as i64, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| timestamp.to_string());
                println!("Handle:         {}", handle);
                println!("Last guess at:  {}", when);
            }
        }

        Commands::Decrypt { owner } => {
            let state = match owner {
                Some(owner) => orchestrator.decrypt_delegated(owner).await,
                None => {
                    orchestrator.refresh().await?;
                    orchestrator.decrypt().await
                }
            };
            print_decryption(state)?;
        }

        Commands::Allow { grantee } => {
            let outcome = orchestrator.grant_access(grantee).await;
            print_outcome(outcome, orchestrator.status())?;
        }

        Commands::Events { participant } => {
            let events = node.events(participant).await?;

            println!("{:<8} {:<44} {:<12}", "Block", "Participant", "Timestamp");
            println!("{}", "-".repeat(66));
            for event in events {
                println!(
                    "{:<8} {:<44} {:<12}",
                    event.block_number, event.participant, event.timestamp
                );
            }
        }
    }

    Ok(())
}
