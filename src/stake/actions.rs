//! Actions the relay can perform and their account plans.

use crate::address::{associated_token_address, AddressBook};
use crate::error::{Error, Result};
use crate::stake::instructions::{
    AgentAccounts, AgentArgs, InitUserStakeArgs, PairArgs, ProxyStakeArgs, StakeAccounts,
};
use crate::stake::plan::{ActionPlan, LabeledInstruction, PlannedAccount};
use solana_sdk::pubkey::Pubkey;

/// Stake `amount` on an agent within a theme, credited to `beneficiary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyStake {
    /// Theme (market) id.
    pub theme_id: u64,
    /// Agent (outcome) id.
    pub agent_id: u16,
    /// Amount in smallest units.
    pub amount: u64,
    /// Identity credited with the stake. Never signs.
    pub beneficiary: Pubkey,
}

impl ProxyStake {
    /// Resolve every address the stake touches and lay out the plan.
    ///
    /// Creator order: `theme_agent`, `agent_vault_authority`, `agent_vault`,
    /// `user_stake`. Each references the ones before it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a zero amount, or a derivation error.
    pub fn plan(
        &self,
        book: &AddressBook,
        relay: &Pubkey,
        stake_mint: &Pubkey,
    ) -> Result<ActionPlan> {
        if self.amount == 0 {
            return Err(Error::Validation("stake amount must be positive".into()));
        }

        let accounts = StakeAccounts {
            program_id: *book.program_id(),
            config: book.config()?.address,
            theme: book.theme(self.theme_id)?.address,
            agent: book.agent(self.agent_id)?.address,
            theme_agent: book.theme_agent(self.theme_id, self.agent_id)?.address,
            agent_vault: book.agent_vault(self.theme_id, self.agent_id)?.address,
            agent_vault_authority: book
                .agent_vault_authority(self.theme_id, self.agent_id)?
                .address,
            user_stake: book
                .user_stake(self.theme_id, self.agent_id, &self.beneficiary)?
                .address,
            beneficiary: self.beneficiary,
            stake_mint: *stake_mint,
            relay: *relay,
            relay_token_account: associated_token_address(relay, stake_mint)?,
        };

        let pair = PairArgs {
            theme_id: self.theme_id,
            agent_id: self.agent_id,
        };

        Ok(ActionPlan {
            action: "proxy_stake",
            accounts: vec![
                PlannedAccount::lookup("config", accounts.config),
                PlannedAccount::lookup("theme", accounts.theme),
                PlannedAccount::lookup("agent", accounts.agent),
                PlannedAccount::state(
                    "theme_agent",
                    accounts.theme_agent,
                    LabeledInstruction::new("init_theme_agent", accounts.init_theme_agent(pair)?),
                ),
                PlannedAccount::state(
                    "agent_vault_authority",
                    accounts.agent_vault_authority,
                    LabeledInstruction::new(
                        "init_agent_vault_authority",
                        accounts.init_agent_vault_authority(pair)?,
                    ),
                ),
                PlannedAccount::state(
                    "agent_vault",
                    accounts.agent_vault,
                    LabeledInstruction::new("init_agent_vault", accounts.init_agent_vault(pair)?),
                ),
                PlannedAccount::state(
                    "user_stake",
                    accounts.user_stake,
                    LabeledInstruction::new(
                        "init_user_stake",
                        accounts.init_user_stake(InitUserStakeArgs {
                            theme_id: self.theme_id,
                            agent_id: self.agent_id,
                            user: self.beneficiary.to_bytes(),
                        })?,
                    ),
                ),
                PlannedAccount::lookup("relay_token_account", accounts.relay_token_account),
            ],
            core: vec![LabeledInstruction::new(
                "proxy_stake",
                accounts.proxy_stake(ProxyStakeArgs {
                    theme_id: self.theme_id,
                    agent_id: self.agent_id,
                    amount: self.amount,
                    beneficiary: self.beneficiary.to_bytes(),
                })?,
            )],
        })
    }
}

/// Register the next agent under the deployment's config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterAgent {
    /// Id the agent receives (the config's current counter).
    pub agent_id: u16,
    /// Freshly generated identity of the agent; co-signs registration.
    pub agent_identity: Pubkey,
}

impl RegisterAgent {
    /// Lay out the registration plan.
    ///
    /// # Errors
    ///
    /// Returns a derivation or encoding error.
    pub fn plan(&self, book: &AddressBook, admin: &Pubkey) -> Result<ActionPlan> {
        let accounts = AgentAccounts {
            program_id: *book.program_id(),
            config: book.config()?.address,
            agent: book.agent(self.agent_id)?.address,
            agent_perf: book.agent_perf(self.agent_id)?.address,
            agent_identity: self.agent_identity,
            admin: *admin,
        };
        let args = AgentArgs {
            agent_id: self.agent_id,
        };

        Ok(ActionPlan {
            action: "register_agent",
            accounts: vec![
                PlannedAccount::lookup("config", accounts.config),
                PlannedAccount::state(
                    "agent_perf",
                    accounts.agent_perf,
                    LabeledInstruction::new("init_agent_perf", accounts.init_agent_perf(args)?),
                ),
                PlannedAccount::lookup("agent", accounts.agent),
            ],
            core: vec![LabeledInstruction::new(
                "register_agent",
                accounts.register_agent(args)?,
            )],
        })
    }
}
