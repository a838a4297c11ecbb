//! Configuration for stake-relay.
//!
//! Secrets are not part of this file: relay and admin keys come from the
//! environment (see [`crate::credentials`]).

use crate::error::{Error, Result};
use crate::payment::wallet::parse_address;
use crate::stake::SubmitSettings;
use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::pubkey::Pubkey;
use std::net::SocketAddr;
use std::time::Duration;

/// Ledger commitment level for reads and confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    /// Processed by the connected node.
    Processed,
    /// Voted on by a supermajority.
    #[default]
    Confirmed,
    /// Rooted.
    Finalized,
}

impl From<Commitment> for CommitmentConfig {
    fn from(c: Commitment) -> Self {
        let commitment = match c {
            Commitment::Processed => CommitmentLevel::Processed,
            Commitment::Confirmed => CommitmentLevel::Confirmed,
            Commitment::Finalized => CommitmentLevel::Finalized,
        };
        Self { commitment }
    }
}

/// Ledger cluster, used for payment network names and explorer links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    /// Mainnet beta.
    Mainnet,
    /// Public devnet.
    #[default]
    Devnet,
}

impl Cluster {
    /// Network identifier used in payment requirements.
    #[must_use]
    pub fn payment_network(&self) -> &'static str {
        match self {
            Self::Mainnet => "solana",
            Self::Devnet => "solana-devnet",
        }
    }

    /// Explorer link for a transaction signature.
    #[must_use]
    pub fn explorer_url(&self, signature: &str) -> String {
        match self {
            Self::Mainnet => format!("https://explorer.solana.com/tx/{signature}"),
            Self::Devnet => format!("https://explorer.solana.com/tx/{signature}?cluster=devnet"),
        }
    }

    /// Default public RPC endpoint.
    #[must_use]
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.mainnet-beta.solana.com",
            Self::Devnet => "https://api.devnet.solana.com",
        }
    }
}

/// Relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Ledger configuration.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Payment gate configuration.
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Public base URL used to build payment resource identifiers.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Maximum request body size in bytes.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

/// Ledger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Cluster the program is deployed on.
    #[serde(default)]
    pub cluster: Cluster,

    /// RPC endpoint. Defaults to the cluster's public endpoint.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Commitment for reads and confirmation.
    #[serde(default)]
    pub commitment: Commitment,

    /// Base58 id of the stake program.
    #[serde(default)]
    pub program_id: Option<String>,

    /// Config id the relay operates under.
    #[serde(default = "default_config_id")]
    pub config_id: u16,

    /// Base58 mint of the staked (and paid) asset.
    #[serde(default)]
    pub stake_mint: Option<String>,

    /// Decimals of the stake mint.
    #[serde(default = "default_decimals")]
    pub stake_decimals: u8,

    /// Interval between confirmation polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Transactions built per request before giving up on rejections.
    #[serde(default = "default_max_submit_attempts")]
    pub max_submit_attempts: u32,

    /// Attempts at fetching a blockhash.
    #[serde(default = "default_checkpoint_retries")]
    pub checkpoint_retries: u32,

    /// Initial backoff between blockhash fetch attempts; doubles each time.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Payment gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Facilitator base URL (`/verify` and `/settle` are appended).
    #[serde(default = "default_facilitator_url")]
    pub facilitator_url: String,

    /// Base58 address that receives settled payments.
    #[serde(default)]
    pub pay_to: Option<String>,

    /// Base58 fee payer the facilitator uses, advertised to clients.
    #[serde(default)]
    pub fee_payer: Option<String>,

    /// Human-readable description attached to requirements.
    #[serde(default = "default_description")]
    pub description: String,

    /// Seconds a client has to complete the payment.
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,

    /// Timeout for facilitator HTTP calls.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Number of settled proof digests remembered to refuse reuse.
    #[serde(default = "default_guard_capacity")]
    pub guard_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_base_url: default_public_base_url(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::default(),
            rpc_url: None,
            commitment: Commitment::default(),
            program_id: None,
            config_id: default_config_id(),
            stake_mint: None,
            stake_decimals: default_decimals(),
            poll_interval_ms: default_poll_interval_ms(),
            max_submit_attempts: default_max_submit_attempts(),
            checkpoint_retries: default_checkpoint_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            facilitator_url: default_facilitator_url(),
            pay_to: None,
            fee_payer: None,
            description: default_description(),
            max_timeout_secs: default_max_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            guard_capacity: default_guard_capacity(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ledger: LedgerConfig::default(),
            payment: PaymentConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8402))
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8402".to_string()
}

const fn default_body_limit() -> usize {
    16 * 1024
}

const fn default_config_id() -> u16 {
    1
}

const fn default_decimals() -> u8 {
    6
}

const fn default_poll_interval_ms() -> u64 {
    500
}

const fn default_max_submit_attempts() -> u32 {
    3
}

const fn default_checkpoint_retries() -> u32 {
    3
}

const fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_facilitator_url() -> String {
    "https://x402.org/facilitator".to_string()
}

fn default_description() -> String {
    "Stake on a prediction-market outcome".to_string()
}

const fn default_max_timeout_secs() -> u64 {
    60
}

const fn default_request_timeout_secs() -> u64 {
    15
}

const fn default_guard_capacity() -> usize {
    100_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Addresses resolved from the string configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddresses {
    /// Stake program.
    pub program_id: Pubkey,
    /// Stake mint (also the payment asset).
    pub stake_mint: Pubkey,
    /// Payment receiver.
    pub pay_to: Pubkey,
    /// Facilitator fee payer, if advertised.
    pub fee_payer: Option<Pubkey>,
}

impl LedgerConfig {
    /// RPC endpoint to use.
    #[must_use]
    pub fn rpc_url(&self) -> String {
        self.rpc_url
            .clone()
            .unwrap_or_else(|| self.cluster.default_rpc_url().to_string())
    }

    /// Confirmation poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Initial blockhash retry backoff.
    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Retry and polling parameters for the submit loop.
    #[must_use]
    pub fn submit_settings(&self) -> SubmitSettings {
        SubmitSettings {
            max_submit_attempts: self.max_submit_attempts,
            checkpoint_retries: self.checkpoint_retries,
            retry_backoff: self.retry_backoff(),
            poll_interval: self.poll_interval(),
        }
    }
}

impl RelayConfig {
    /// Create a devnet configuration preset.
    ///
    /// Program id, mint and payment receiver still have to be supplied.
    #[must_use]
    pub fn devnet() -> Self {
        Self {
            ledger: LedgerConfig {
                cluster: Cluster::Devnet,
                ..LedgerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Parse and check every address the relay needs.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first missing or malformed value.
    pub fn resolve_addresses(&self) -> Result<ResolvedAddresses> {
        let required = |value: &Option<String>, name: &str| -> Result<Pubkey> {
            let raw = value
                .as_deref()
                .ok_or_else(|| Error::Config(format!("{name} is not set")))?;
            parse_address(raw).map_err(|e| Error::Config(format!("{name}: {e}")))
        };

        let fee_payer = self
            .payment
            .fee_payer
            .as_deref()
            .map(|raw| {
                parse_address(raw).map_err(|e| Error::Config(format!("payment.fee_payer: {e}")))
            })
            .transpose()?;

        Ok(ResolvedAddresses {
            program_id: required(&self.ledger.program_id, "ledger.program_id")?,
            stake_mint: required(&self.ledger.stake_mint, "ledger.stake_mint")?,
            pay_to: required(&self.payment.pay_to, "payment.pay_to")?,
            fee_payer,
        })
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.resolve_addresses()?;
        if self.ledger.max_submit_attempts == 0 {
            return Err(Error::Config(
                "ledger.max_submit_attempts must be at least 1".into(),
            ));
        }
        if self.ledger.checkpoint_retries == 0 {
            return Err(Error::Config(
                "ledger.checkpoint_retries must be at least 1".into(),
            ));
        }
        if self.ledger.stake_decimals > 18 {
            return Err(Error::Config(format!(
                "ledger.stake_decimals {} is out of range",
                self.ledger.stake_decimals
            )));
        }
        if self.payment.guard_capacity == 0 {
            return Err(Error::Config("payment.guard_capacity must be non-zero".into()));
        }
        reqwest::Url::parse(&self.payment.facilitator_url)
            .map_err(|e| Error::Config(format!("payment.facilitator_url: {e}")))?;
        reqwest::Url::parse(&self.server.public_base_url)
            .map_err(|e| Error::Config(format!("server.public_base_url: {e}")))?;
        Ok(())
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
