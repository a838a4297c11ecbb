//! Error types for stake-relay.

use solana_sdk::signature::Signature;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Why the ledger refused a transaction before (or while) including it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// The cited blockhash is unknown or expired; rebuild with a fresh one.
    CheckpointExpired,
    /// An init instruction targeted an account that already exists.
    ///
    /// Usually a concurrent request initialized it first.
    DuplicateInitialization,
    /// Anything else (insufficient relay balance, program error, ...).
    Other,
}

impl std::fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CheckpointExpired => write!(f, "checkpoint expired"),
            Self::DuplicateInitialization => write!(f, "duplicate initialization"),
            Self::Other => write!(f, "rejected"),
        }
    }
}

/// Errors that can occur in stake-relay.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed caller input (amount, beneficiary, identifiers).
    #[error("invalid request: {0}")]
    Validation(String),

    /// A seed component has the wrong width for its namespace.
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    /// No bump produced an off-curve address.
    #[error("address derivation failed: {0}")]
    AddressDerivation(String),

    /// Account bytes do not match the expected layout.
    #[error("account layout mismatch: {0}")]
    Layout(String),

    /// Ledger RPC call failed (transient, distinct from "account absent").
    #[error("ledger rpc error: {0}")]
    Rpc(String),

    /// The facilitator judged the payment proof invalid.
    #[error("payment rejected: {0}")]
    PaymentRejected(String),

    /// The facilitator could not be reached or answered garbage.
    #[error("payment facilitator unavailable: {0}")]
    FacilitatorUnavailable(String),

    /// Verification passed but the transfer did not settle.
    #[error("payment settlement failed: {0}")]
    SettlementFailed(String),

    /// Requested stake is smaller than the program's configured minimum.
    #[error("stake amount {amount} is below the minimum of {minimum}")]
    BelowMinimumStake {
        /// Requested amount in smallest units.
        amount: u64,
        /// Minimum decoded from the config account.
        minimum: u64,
    },

    /// The network refused the signed transaction.
    #[error("transaction rejected ({kind}): {message}")]
    SubmissionRejected {
        /// Classified reason.
        kind: RejectionKind,
        /// Raw message from the RPC node.
        message: String,
        /// Instruction the node blamed, when it said.
        instruction: Option<u8>,
    },

    /// The transaction landed but its execution failed.
    #[error("transaction {signature} failed: {message}")]
    TransactionFailed {
        /// Signature of the failed transaction.
        signature: Signature,
        /// Execution error reported by the ledger.
        message: String,
    },

    /// Confirmation polling ran past the blockhash validity window.
    ///
    /// The outcome is unknown: the transaction may still land.
    #[error("{signature} unconfirmed by block {last_valid_block_height}, outcome unknown")]
    ConfirmationExpired {
        /// Signature that was submitted.
        signature: Signature,
        /// Last block height at which the transaction could have landed.
        last_valid_block_height: u64,
    },

    /// Building or signing the transaction failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// Key material could not be loaded.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether retrying the same request later could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Rpc(_)
                | Self::FacilitatorUnavailable(_)
                | Self::SubmissionRejected {
                    kind: RejectionKind::CheckpointExpired,
                    ..
                }
        )
    }

    /// Whether the caller sent something we refuse to act on.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::InvalidSeed(_) | Self::BelowMinimumStake { .. }
        )
    }

    /// Whether the ledger outcome is unknown rather than failed.
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::ConfirmationExpired { .. })
    }
}
