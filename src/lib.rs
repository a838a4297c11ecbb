//! # stake-relay
//!
//! Payment-gated relay that stakes on a prediction-market program on behalf
//! of users.
//!
//! A stake request is priced in the stake asset and must carry a settled
//! x402-style payment. Once paid, the relay derives every program address the
//! stake touches, probes which state accounts already exist, creates the
//! missing ones in dependency order and stakes, all in a single transaction it
//! signs and pays for.
//!
//! ## Architecture
//!
//! ```text
//! POST /api/stake ──▶ server ──▶ payment::PaymentGate ──▶ stake::StakeRelay
//!                                     │                       │
//!                                     ▼                       ├─ address (PDAs)
//!                               Facilitator (HTTP)            ├─ ledger (probe, layouts)
//!                                                             └─ submit / confirm
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use stake_relay::address::AddressBook;
//! use stake_relay::credentials::RelayCredentials;
//! use stake_relay::ledger::SolanaRpc;
//! use stake_relay::stake::{StakeRelay, SubmitSettings};
//! use solana_sdk::commitment_config::CommitmentConfig;
//! use solana_sdk::pubkey::Pubkey;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = Arc::new(SolanaRpc::new(
//!         "https://api.devnet.solana.com".into(),
//!         CommitmentConfig::confirmed(),
//!     ));
//!     let book = AddressBook::new(Pubkey::new_unique(), 1);
//!     let relay = StakeRelay::new(book, Pubkey::new_unique(), ledger, SubmitSettings::default());
//!     let registration = relay.register_agent(&RelayCredentials::from_env()?).await?;
//!     println!("agent {} at {}", registration.agent_id, registration.agent);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod address;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ledger;
pub mod payment;
pub mod redact;
pub mod server;
pub mod stake;

pub use address::{AddressBook, DerivedAddress, Namespace, SeedPart};
pub use config::RelayConfig;
pub use credentials::RelayCredentials;
pub use error::{Error, RejectionKind, Result};
pub use ledger::{AccountProber, LedgerRpc, SolanaRpc};
pub use payment::{GateDecision, HttpFacilitator, PaymentGate, SettledPayment};
pub use stake::{ProxyStake, StakeRelay, SubmitSettings};
