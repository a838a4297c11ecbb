//! Instruction encoders for the stake program.
//!
//! Data is an 8-byte discriminator (`sha256("global:<name>")[..8]`) followed
//! by the borsh-encoded arguments.

use crate::address::programs::{
    ASSOCIATED_TOKEN_PROGRAM_ID, RENT_SYSVAR_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID,
};
use crate::error::{Error, Result};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

/// Discriminator of `proxy_stake`.
pub const PROXY_STAKE: [u8; 8] = [235, 211, 106, 250, 20, 66, 150, 117];
/// Discriminator of `init_user_stake`.
pub const INIT_USER_STAKE: [u8; 8] = [89, 155, 182, 115, 52, 203, 48, 104];
/// Discriminator of `init_theme_agent`.
pub const INIT_THEME_AGENT: [u8; 8] = [49, 67, 96, 21, 156, 124, 241, 234];
/// Discriminator of `init_agent_vault_authority`.
pub const INIT_AGENT_VAULT_AUTHORITY: [u8; 8] = [29, 30, 232, 152, 51, 69, 58, 241];
/// Discriminator of `init_agent_vault`.
pub const INIT_AGENT_VAULT: [u8; 8] = [126, 32, 86, 4, 140, 200, 150, 65];
/// Discriminator of `init_agent_perf`.
pub const INIT_AGENT_PERF: [u8; 8] = [163, 98, 255, 233, 238, 139, 252, 216];
/// Discriminator of `register_agent`.
pub const REGISTER_AGENT: [u8; 8] = [135, 157, 66, 195, 2, 113, 175, 30];

/// Arguments shared by the per-pair init instructions.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairArgs {
    /// Theme id.
    pub theme_id: u64,
    /// Agent id.
    pub agent_id: u16,
}

/// Arguments of `init_user_stake`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitUserStakeArgs {
    /// Theme id.
    pub theme_id: u64,
    /// Agent id.
    pub agent_id: u16,
    /// Beneficiary the record belongs to.
    pub user: [u8; 32],
}

/// Arguments of `proxy_stake`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyStakeArgs {
    /// Theme id.
    pub theme_id: u64,
    /// Agent id.
    pub agent_id: u16,
    /// Amount in smallest units.
    pub amount: u64,
    /// Beneficiary credited with the stake.
    pub beneficiary: [u8; 32],
}

/// Arguments of `init_agent_perf` and `register_agent`.
#[derive(BorshSerialize, BorshDeserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentArgs {
    /// Agent id being registered.
    pub agent_id: u16,
}

fn encode<A: BorshSerialize>(discriminator: [u8; 8], args: &A) -> Result<Vec<u8>> {
    let mut data = discriminator.to_vec();
    args.serialize(&mut data)
        .map_err(|e| Error::Serialization(format!("instruction args: {e}")))?;
    Ok(data)
}

/// Addresses every proxy-stake instruction draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakeAccounts {
    /// Stake program.
    pub program_id: Pubkey,
    /// Deployment config.
    pub config: Pubkey,
    /// Theme (market).
    pub theme: Pubkey,
    /// Agent (outcome).
    pub agent: Pubkey,
    /// Theme/agent pair.
    pub theme_agent: Pubkey,
    /// Vault for the pair.
    pub agent_vault: Pubkey,
    /// Vault signer.
    pub agent_vault_authority: Pubkey,
    /// Beneficiary's stake record.
    pub user_stake: Pubkey,
    /// Beneficiary.
    pub beneficiary: Pubkey,
    /// Stake mint.
    pub stake_mint: Pubkey,
    /// Relay identity (fee payer and token source owner).
    pub relay: Pubkey,
    /// Relay's token account for the stake mint.
    pub relay_token_account: Pubkey,
}

impl StakeAccounts {
    /// `init_theme_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if args cannot be encoded.
    pub fn init_theme_agent(&self, args: PairArgs) -> Result<Instruction> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.config, false),
                AccountMeta::new_readonly(self.theme, false),
                AccountMeta::new_readonly(self.agent, false),
                AccountMeta::new(self.theme_agent, false),
                AccountMeta::new(self.relay, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: encode(INIT_THEME_AGENT, &args)?,
        })
    }

    /// `init_agent_vault_authority`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if args cannot be encoded.
    pub fn init_agent_vault_authority(&self, args: PairArgs) -> Result<Instruction> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.theme_agent, false),
                AccountMeta::new(self.agent_vault_authority, false),
                AccountMeta::new(self.relay, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: encode(INIT_AGENT_VAULT_AUTHORITY, &args)?,
        })
    }

    /// `init_agent_vault`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if args cannot be encoded.
    pub fn init_agent_vault(&self, args: PairArgs) -> Result<Instruction> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.theme_agent, false),
                AccountMeta::new_readonly(self.agent_vault_authority, false),
                AccountMeta::new(self.agent_vault, false),
                AccountMeta::new_readonly(self.stake_mint, false),
                AccountMeta::new(self.relay, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
                AccountMeta::new_readonly(RENT_SYSVAR_ID, false),
            ],
            data: encode(INIT_AGENT_VAULT, &args)?,
        })
    }

    /// `init_user_stake`. The beneficiary is referenced but does not sign.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if args cannot be encoded.
    pub fn init_user_stake(&self, args: InitUserStakeArgs) -> Result<Instruction> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.theme_agent, false),
                AccountMeta::new(self.user_stake, false),
                AccountMeta::new_readonly(self.beneficiary, false),
                AccountMeta::new(self.relay, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: encode(INIT_USER_STAKE, &args)?,
        })
    }

    /// `proxy_stake`: move `amount` from the relay's token account into the
    /// vault, credited to the beneficiary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if args cannot be encoded.
    pub fn proxy_stake(&self, args: ProxyStakeArgs) -> Result<Instruction> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.config, false),
                AccountMeta::new(self.theme, false),
                AccountMeta::new_readonly(self.agent, false),
                AccountMeta::new(self.theme_agent, false),
                AccountMeta::new(self.agent_vault, false),
                AccountMeta::new_readonly(self.agent_vault_authority, false),
                AccountMeta::new(self.user_stake, false),
                AccountMeta::new_readonly(self.beneficiary, false),
                AccountMeta::new_readonly(self.stake_mint, false),
                AccountMeta::new(self.relay_token_account, false),
                AccountMeta::new(self.relay, true),
                AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                AccountMeta::new_readonly(ASSOCIATED_TOKEN_PROGRAM_ID, false),
            ],
            data: encode(PROXY_STAKE, &args)?,
        })
    }
}

/// Addresses used when registering an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentAccounts {
    /// Stake program.
    pub program_id: Pubkey,
    /// Deployment config (its agent counter is bumped).
    pub config: Pubkey,
    /// New agent account.
    pub agent: Pubkey,
    /// New agent performance account.
    pub agent_perf: Pubkey,
    /// Fresh identity of the agent, co-signing its registration.
    pub agent_identity: Pubkey,
    /// Admin (fee payer).
    pub admin: Pubkey,
}

impl AgentAccounts {
    /// `init_agent_perf`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if args cannot be encoded.
    pub fn init_agent_perf(&self, args: AgentArgs) -> Result<Instruction> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new_readonly(self.config, false),
                AccountMeta::new(self.agent_perf, false),
                AccountMeta::new(self.admin, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: encode(INIT_AGENT_PERF, &args)?,
        })
    }

    /// `register_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if args cannot be encoded.
    pub fn register_agent(&self, args: AgentArgs) -> Result<Instruction> {
        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::new(self.config, false),
                AccountMeta::new(self.agent, false),
                AccountMeta::new_readonly(self.agent_perf, false),
                AccountMeta::new_readonly(self.agent_identity, true),
                AccountMeta::new(self.admin, true),
                AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            ],
            data: encode(REGISTER_AGENT, &args)?,
        })
    }
}
