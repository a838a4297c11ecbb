//! Command-line interface definition.

use clap::{Parser, Subcommand, ValueEnum};
use stake_relay::config::{Cluster, RelayConfig};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Payment-gated staking relay.
#[derive(Parser, Debug)]
#[command(name = "stake-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file.
    #[arg(long, short, global = true, env = "STAKE_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cluster the program is deployed on.
    #[arg(long, value_enum, global = true, env = "STAKE_RELAY_CLUSTER")]
    pub cluster: Option<CliCluster>,

    /// Ledger RPC endpoint.
    #[arg(long, global = true, env = "STAKE_RELAY_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Stake program id (base58).
    #[arg(long, global = true, env = "STAKE_RELAY_PROGRAM_ID")]
    pub program_id: Option<String>,

    /// Config id the relay operates under.
    #[arg(long, global = true, env = "STAKE_RELAY_CONFIG_ID")]
    pub config_id: Option<u16>,

    /// Stake mint (base58).
    #[arg(long, global = true, env = "STAKE_RELAY_STAKE_MINT")]
    pub stake_mint: Option<String>,

    /// Log level.
    #[arg(long, value_enum, global = true, env = "STAKE_RELAY_LOG_LEVEL")]
    pub log_level: Option<CliLogLevel>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP relay.
    Serve {
        /// Listen address.
        #[arg(long, env = "STAKE_RELAY_LISTEN")]
        listen: Option<SocketAddr>,

        /// Facilitator base URL.
        #[arg(long, env = "STAKE_RELAY_FACILITATOR_URL")]
        facilitator_url: Option<String>,

        /// Address receiving payments (base58).
        #[arg(long, env = "STAKE_RELAY_PAY_TO")]
        pay_to: Option<String>,

        /// Public base URL clients reach the relay at.
        #[arg(long, env = "STAKE_RELAY_PUBLIC_URL")]
        public_url: Option<String>,
    },

    /// Print every address a stake touches.
    Addresses {
        /// Theme id.
        #[arg(long)]
        theme_id: u64,

        /// Agent id.
        #[arg(long)]
        agent_id: u16,

        /// Beneficiary (base58); adds the user's stake record.
        #[arg(long)]
        user: Option<String>,
    },

    /// Register the next agent (requires the admin key).
    RegisterAgent {
        /// Write the new agent identity's keypair (JSON byte array) here.
        #[arg(long)]
        keypair_out: Option<PathBuf>,
    },
}

/// Cluster CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliCluster {
    /// Mainnet beta.
    Mainnet,
    /// Public devnet.
    Devnet,
}

/// Log level CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum CliLogLevel {
    /// Error messages only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Informational messages (default).
    #[default]
    Info,
    /// Debug messages.
    Debug,
    /// Trace messages (verbose).
    Trace,
}

impl Cli {
    /// Load the configuration file (or defaults) and apply CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn load_config(&self) -> color_eyre::Result<RelayConfig> {
        let mut config = if let Some(ref path) = self.config {
            RelayConfig::from_file(path)?
        } else {
            RelayConfig::devnet()
        };

        if let Some(cluster) = self.cluster {
            config.ledger.cluster = cluster.into();
        }
        if let Some(ref url) = self.rpc_url {
            config.ledger.rpc_url = Some(url.clone());
        }
        if let Some(ref id) = self.program_id {
            config.ledger.program_id = Some(id.clone());
        }
        if let Some(id) = self.config_id {
            config.ledger.config_id = id;
        }
        if let Some(ref mint) = self.stake_mint {
            config.ledger.stake_mint = Some(mint.clone());
        }
        if let Some(level) = self.log_level {
            config.log_level = level.into();
        }

        if let Command::Serve {
            listen,
            ref facilitator_url,
            ref pay_to,
            ref public_url,
        } = self.command
        {
            if let Some(addr) = listen {
                config.server.listen_addr = addr;
            }
            if let Some(url) = facilitator_url {
                config.payment.facilitator_url = url.clone();
            }
            if let Some(addr) = pay_to {
                config.payment.pay_to = Some(addr.clone());
            }
            if let Some(url) = public_url {
                config.server.public_base_url = url.clone();
            }
        }

        Ok(config)
    }
}

impl From<CliCluster> for Cluster {
    fn from(c: CliCluster) -> Self {
        match c {
            CliCluster::Mainnet => Self::Mainnet,
            CliCluster::Devnet => Self::Devnet,
        }
    }
}

impl From<CliLogLevel> for String {
    fn from(level: CliLogLevel) -> Self {
        match level {
            CliLogLevel::Error => "error".to_string(),
            CliLogLevel::Warn => "warn".to_string(),
            CliLogLevel::Info => "info".to_string(),
            CliLogLevel::Debug => "debug".to_string(),
            CliLogLevel::Trace => "trace".to_string(),
        }
    }
}
