//! Classification of ledger rejections.

use crate::error::RejectionKind;
use solana_sdk::instruction::InstructionError;
use solana_sdk::transaction::TransactionError;

/// System program error code for "account already in use".
const SYSTEM_ACCOUNT_ALREADY_IN_USE: u32 = 0;

/// Classify a structured transaction error.
///
/// Program-level init goes through the system program's `create_account`,
/// whose "already in use" failure surfaces as `Custom(0)` on the calling
/// instruction. Program errors start well above zero.
#[must_use]
pub fn classify_transaction_error(error: &TransactionError) -> RejectionKind {
    match error {
        TransactionError::BlockhashNotFound => RejectionKind::CheckpointExpired,
        TransactionError::InstructionError(
            _,
            InstructionError::Custom(SYSTEM_ACCOUNT_ALREADY_IN_USE)
            | InstructionError::AccountAlreadyInitialized,
        ) => RejectionKind::DuplicateInitialization,
        _ => RejectionKind::Other,
    }
}

/// Index of the instruction a transaction error blames, if any.
#[must_use]
pub fn failed_instruction(error: &TransactionError) -> Option<u8> {
    match error {
        TransactionError::InstructionError(index, _) => Some(*index),
        _ => None,
    }
}

/// Narrow `kind` for a transaction whose first `creators` instructions
/// initialize accounts.
///
/// Only a creator can lose an initialization race. A duplicate blamed on a
/// later instruction is an ordinary failure.
#[must_use]
pub fn restrict_to_creators(
    kind: RejectionKind,
    instruction: Option<u8>,
    creators: usize,
) -> RejectionKind {
    match (kind, instruction) {
        (RejectionKind::DuplicateInitialization, Some(index)) if usize::from(index) >= creators => {
            RejectionKind::Other
        }
        _ => kind,
    }
}

/// Classify an unstructured RPC error message.
#[must_use]
pub fn classify_message(message: &str) -> RejectionKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("blockhash not found") || lower.contains("blockhashnotfound") {
        RejectionKind::CheckpointExpired
    } else if lower.contains("already in use") || lower.contains("already initialized") {
        RejectionKind::DuplicateInitialization
    } else {
        RejectionKind::Other
    }
}
