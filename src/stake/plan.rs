//! Declarative account plans and the generic assembly fold.
//!
//! An action lists the accounts its core instruction touches. State-bearing
//! accounts carry the instruction that creates them; assembly walks the list
//! in order, emits a creator only for accounts the ledger reported absent, and
//! appends the core instruction(s) last.

use crate::error::{Error, Result};
use crate::ledger::ExistenceRecord;
use solana_sdk::instruction::Instruction;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;

/// An instruction together with a short name for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledInstruction {
    /// Instruction name, e.g. `init_user_stake`.
    pub label: &'static str,
    /// Encoded instruction.
    pub instruction: Instruction,
}

impl LabeledInstruction {
    /// Attach a label to an instruction.
    #[must_use]
    pub fn new(label: &'static str, instruction: Instruction) -> Self {
        Self { label, instruction }
    }
}

/// How an action relates to one of its accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRole {
    /// Read or referenced only; must already exist, never probed.
    Lookup,
    /// Holds state; created by the given instruction when absent.
    State(LabeledInstruction),
}

/// One account in an action plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedAccount {
    /// Short name, e.g. `user_stake`.
    pub name: &'static str,
    /// Resolved address.
    pub address: Pubkey,
    /// Role in the action.
    pub role: AccountRole,
}

impl PlannedAccount {
    /// A lookup account.
    #[must_use]
    pub fn lookup(name: &'static str, address: Pubkey) -> Self {
        Self {
            name,
            address,
            role: AccountRole::Lookup,
        }
    }

    /// A state-bearing account and its creator.
    #[must_use]
    pub fn state(name: &'static str, address: Pubkey, init: LabeledInstruction) -> Self {
        Self {
            name,
            address,
            role: AccountRole::State(init),
        }
    }
}

/// Everything needed to assemble one action's transaction.
///
/// State-bearing accounts appear in dependency order: an account whose
/// creator references another state account comes after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    /// Action name for logs.
    pub action: &'static str,
    /// Accounts in dependency order.
    pub accounts: Vec<PlannedAccount>,
    /// Instructions appended after every needed creator.
    pub core: Vec<LabeledInstruction>,
}

impl ActionPlan {
    /// Addresses that must be probed before assembly, in plan order.
    #[must_use]
    pub fn state_addresses(&self) -> Vec<Pubkey> {
        self.accounts
            .iter()
            .filter(|a| matches!(a.role, AccountRole::State(_)))
            .map(|a| a.address)
            .collect()
    }

    /// Address of a named account.
    #[must_use]
    pub fn address_of(&self, name: &str) -> Option<Pubkey> {
        self.accounts
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.address)
    }
}

/// Ordered instruction list ready to be compiled into a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledAction {
    /// Instructions in submission order.
    pub instructions: Vec<LabeledInstruction>,
    /// How many leading instructions are creators.
    pub creators: usize,
}

impl AssembledAction {
    /// Labels in submission order.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        self.instructions.iter().map(|i| i.label).collect()
    }

    /// Bare instructions in submission order.
    #[must_use]
    pub fn instructions(&self) -> Vec<Instruction> {
        self.instructions
            .iter()
            .map(|i| i.instruction.clone())
            .collect()
    }
}

/// Fold a plan and fresh existence records into an instruction list.
///
/// # Errors
///
/// Returns [`Error::Validation`] if a state-bearing account has no record,
/// which means the records were probed for a different plan.
pub fn assemble(plan: &ActionPlan, records: &[ExistenceRecord]) -> Result<AssembledAction> {
    let existing: HashMap<Pubkey, bool> = records
        .iter()
        .map(|r| (r.address, r.exists()))
        .collect();

    let mut instructions = Vec::with_capacity(plan.accounts.len() + plan.core.len());
    for account in &plan.accounts {
        let AccountRole::State(init) = &account.role else {
            continue;
        };
        let exists = existing.get(&account.address).copied().ok_or_else(|| {
            Error::Validation(format!(
                "{}: no existence record for {} ({})",
                plan.action, account.name, account.address
            ))
        })?;
        if !exists {
            instructions.push(init.clone());
        }
    }
    let creators = instructions.len();
    instructions.extend(plan.core.iter().cloned());

    Ok(AssembledAction {
        instructions,
        creators,
    })
}
