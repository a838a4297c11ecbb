//! Ledger access: RPC seam, account probing and fixed-layout decoding.
//!
//! # Architecture
//!
//! ```text
//! StakeRelay ──▶ AccountProber ──▶ dyn LedgerRpc ──▶ SolanaRpc (RPC endpoint)
//!      │                                 ▲
//!      └──── submit / confirm ───────────┘
//! ```
//!
//! Everything above [`LedgerRpc`] is network-agnostic so the pipeline can be
//! driven by an in-memory ledger in tests.

pub mod layout;
mod probe;
mod rejection;
mod rpc;

pub use layout::{AccountLayout, ConfigAccount, FieldKind, FieldSpec, CONFIG_LAYOUT, LAYOUT_VERSION};
pub use probe::{AccountProber, ExistenceRecord};
pub use rejection::{
    classify_message, classify_transaction_error, failed_instruction, restrict_to_creators,
};
pub use rpc::SolanaRpc;

use crate::error::Result;
use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{TransactionError, VersionedTransaction};

/// A recent blockhash and the last block height at which it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Blockhash the transaction cites.
    pub blockhash: Hash,
    /// Height after which a transaction citing `blockhash` can never land.
    pub last_valid_block_height: u64,
}

/// Execution status of a submitted signature.
pub type SignatureOutcome = std::result::Result<(), TransactionError>;

/// Minimal ledger RPC surface used by the relay.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Raw account bytes, or `None` if no account exists at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rpc`] if the node could not be queried. An RPC
    /// failure must never be reported as `Ok(None)`.
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;

    /// Fetch a recent blockhash and its validity horizon.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rpc`] on transport failure.
    async fn get_latest_checkpoint(&self) -> Result<Checkpoint>;

    /// Submit a signed transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::SubmissionRejected`] if the node refused the
    /// transaction, [`crate::Error::Rpc`] on transport failure.
    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature>;

    /// Status of a signature at the configured commitment; `None` while pending.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rpc`] on transport failure.
    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureOutcome>>;

    /// Current block height.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rpc`] on transport failure.
    async fn block_height(&self) -> Result<u64>;
}
