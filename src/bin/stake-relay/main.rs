//! stake-relay CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::eyre;
use serde_json::json;
use solana_sdk::signature::Signer;
use stake_relay::address::AddressBook;
use stake_relay::config::RelayConfig;
use stake_relay::credentials::RelayCredentials;
use stake_relay::ledger::SolanaRpc;
use stake_relay::payment::{
    parse_address, HttpFacilitator, PaymentGate, PaymentGateConfig, PaymentWallet,
};
use stake_relay::redact::redact_secret_fields;
use stake_relay::server::{self, AppState};
use stake_relay::stake::StakeRelay;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("stake-relay v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve { .. } => serve(config).await,
        Command::Addresses {
            theme_id,
            agent_id,
            user,
        } => print_addresses(&config, theme_id, agent_id, user.as_deref()),
        Command::RegisterAgent { keypair_out } => register_agent(&config, keypair_out).await,
    }
}

fn build_relay(config: &RelayConfig) -> color_eyre::Result<StakeRelay> {
    let program_id = parse_address(
        config
            .ledger
            .program_id
            .as_deref()
            .ok_or_else(|| eyre!("ledger.program_id is not set"))?,
    )?;
    let stake_mint = parse_address(
        config
            .ledger
            .stake_mint
            .as_deref()
            .ok_or_else(|| eyre!("ledger.stake_mint is not set"))?,
    )?;

    let rpc_url = config.ledger.rpc_url();
    info!("Ledger RPC: {rpc_url} ({:?})", config.ledger.commitment);
    let ledger = Arc::new(SolanaRpc::new(rpc_url, config.ledger.commitment.into()));

    Ok(StakeRelay::new(
        AddressBook::new(program_id, config.ledger.config_id),
        stake_mint,
        ledger,
        config.ledger.submit_settings(),
    ))
}

async fn serve(config: RelayConfig) -> color_eyre::Result<()> {
    config.validate()?;
    let addresses = config.resolve_addresses()?;
    let credentials = Arc::new(RelayCredentials::from_env()?);
    info!("Relay identity: {}", credentials.relay_pubkey());

    let relay = build_relay(&config)?;
    match relay.load_config().await {
        Ok(onchain) => info!(
            "Deployment config {}: min stake {}, next agent {}, paused={}",
            config.ledger.config_id, onchain.min_stake_amount, onchain.next_agent_id, onchain.paused
        ),
        Err(e) => warn!("Could not read deployment config at startup: {e}"),
    }

    let facilitator = HttpFacilitator::new(
        &config.payment.facilitator_url,
        Duration::from_secs(config.payment.request_timeout_secs),
    )?;
    info!("Payment facilitator: {}", facilitator.base_url());

    let gate = PaymentGate::new(
        Arc::new(facilitator),
        PaymentGateConfig {
            wallet: PaymentWallet::new(
                addresses.pay_to,
                addresses.stake_mint,
                addresses.fee_payer,
            ),
            network: config.ledger.cluster.payment_network().to_string(),
            resource: format!(
                "{}/api/stake",
                config.server.public_base_url.trim_end_matches('/')
            ),
            description: config.payment.description.clone(),
            max_timeout_secs: config.payment.max_timeout_secs,
            guard_capacity: config.payment.guard_capacity,
        },
    );

    let state = Arc::new(AppState {
        gate,
        relay,
        credentials,
        decimals: config.ledger.stake_decimals,
        cluster: config.ledger.cluster,
    });

    let app = server::router(state, config.server.body_limit_bytes);
    server::serve(config.server.listen_addr, app, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Shutting down");
    })
    .await?;
    Ok(())
}

fn print_addresses(
    config: &RelayConfig,
    theme_id: u64,
    agent_id: u16,
    user: Option<&str>,
) -> color_eyre::Result<()> {
    let program_id = parse_address(
        config
            .ledger
            .program_id
            .as_deref()
            .ok_or_else(|| eyre!("ledger.program_id is not set"))?,
    )?;
    let book = AddressBook::new(program_id, config.ledger.config_id);

    let mut derived = vec![
        book.config()?,
        book.theme(theme_id)?,
        book.agent(agent_id)?,
        book.agent_perf(agent_id)?,
        book.theme_agent(theme_id, agent_id)?,
        book.agent_vault_authority(theme_id, agent_id)?,
        book.agent_vault(theme_id, agent_id)?,
    ];
    if let Some(user) = user {
        derived.push(book.user_stake(theme_id, agent_id, &parse_address(user)?)?);
    }

    let entries: Vec<_> = derived
        .iter()
        .map(|d| {
            json!({
                "namespace": d.namespace.to_string(),
                "address": d.address.to_string(),
                "bump": d.bump,
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "programId": program_id.to_string(),
            "configId": config.ledger.config_id,
            "accounts": entries,
        }))?
    );
    Ok(())
}

async fn register_agent(
    config: &RelayConfig,
    keypair_out: Option<std::path::PathBuf>,
) -> color_eyre::Result<()> {
    let credentials = RelayCredentials::from_env()?;
    let relay = build_relay(config)?;
    let registration = relay.register_agent(&credentials).await?;
    info!(
        "Registered agent {} ({}) in {}",
        registration.agent_id, registration.agent, registration.signature
    );

    if let Some(path) = keypair_out {
        let bytes = registration.identity().to_bytes().to_vec();
        tokio::fs::write(&path, serde_json::to_vec(&bytes)?).await?;
        info!(
            "Wrote identity {} to {}",
            registration.identity().pubkey(),
            path.display()
        );
    }

    let record = redact_secret_fields(registration.to_record());
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
