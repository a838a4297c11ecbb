//! Deterministic program-derived address resolution.
//!
//! Every account the stake program owns lives at an address computed from a
//! namespace tag and a tuple of little-endian identifiers:
//!
//! ```text
//! sha256(tag ++ part1 ++ part2 ++ ... ++ bump ++ program_id ++ "ProgramDerivedAddress")
//! ```
//!
//! searched from bump 255 downward until the hash falls off the ed25519 curve.
//! The width of each identifier is part of the program's published interface:
//! encoding a `u16` agent id as four bytes derives a perfectly valid address
//! that simply does not exist. [`Namespace::derive`] therefore checks the
//! tuple against the per-tag width table before hashing anything.
//!
//! | Tag | Parts after the tag |
//! |---|---|
//! | `config` | `config_id: u16` |
//! | `agent` | `config_id: u16`, `agent_id: u16` |
//! | `agent_perf` | `config_id: u16`, `agent_id: u16` |
//! | `theme` | `config_id: u16`, `theme_id: u64` |
//! | `theme_agent` | `theme_id: u64`, `agent_id: u16` |
//! | `agent_vault` | `theme_id: u64`, `agent_id: u16` |
//! | `agent_vault_authority` | `theme_id: u64`, `agent_id: u16` |
//! | `user_stake` | `theme_id: u64`, `agent_id: u16`, `user: Pubkey` |

pub mod programs;

use crate::error::{Error, Result};
use solana_sdk::pubkey::{Pubkey, MAX_SEEDS, MAX_SEED_LEN};
use std::fmt;

/// Logical account kinds defined by the stake program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Global configuration for one deployment.
    Config,
    /// Market (theme) account.
    Theme,
    /// Registered agent (outcome).
    Agent,
    /// Per-user stake record for one theme/agent pair.
    UserStake,
    /// Agent participation in a theme.
    ThemeAgent,
    /// Token vault holding stakes for a theme/agent pair.
    AgentVault,
    /// PDA that signs for [`Namespace::AgentVault`].
    AgentVaultAuthority,
    /// Agent performance counters.
    AgentPerf,
}

/// Encoded width of one identifier component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedWidth {
    /// 1 byte.
    U8,
    /// 2 bytes, little-endian.
    U16,
    /// 4 bytes, little-endian.
    U32,
    /// 8 bytes, little-endian.
    U64,
    /// 32-byte public key.
    Pubkey,
}

impl fmt::Display for SeedWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Pubkey => "pubkey",
        };
        f.write_str(s)
    }
}

/// One component of an identifier tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedPart {
    /// Single byte, e.g. an option index.
    U8(u8),
    /// 16-bit id (config id, agent id).
    U16(u16),
    /// 32-bit id.
    U32(u32),
    /// 64-bit id (theme id).
    U64(u64),
    /// Raw public key.
    Pubkey(Pubkey),
}

impl SeedPart {
    /// The width this part encodes to.
    #[must_use]
    pub fn width(&self) -> SeedWidth {
        match self {
            Self::U8(_) => SeedWidth::U8,
            Self::U16(_) => SeedWidth::U16,
            Self::U32(_) => SeedWidth::U32,
            Self::U64(_) => SeedWidth::U64,
            Self::Pubkey(_) => SeedWidth::Pubkey,
        }
    }

    /// Little-endian seed bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::U8(v) => vec![*v],
            Self::U16(v) => v.to_le_bytes().to_vec(),
            Self::U32(v) => v.to_le_bytes().to_vec(),
            Self::U64(v) => v.to_le_bytes().to_vec(),
            Self::Pubkey(k) => k.to_bytes().to_vec(),
        }
    }
}

impl Namespace {
    /// All namespaces, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Config,
        Self::Theme,
        Self::Agent,
        Self::UserStake,
        Self::ThemeAgent,
        Self::AgentVault,
        Self::AgentVaultAuthority,
        Self::AgentPerf,
    ];

    /// ASCII tag used as the first seed.
    #[must_use]
    pub fn tag(&self) -> &'static [u8] {
        match self {
            Self::Config => b"config",
            Self::Theme => b"theme",
            Self::Agent => b"agent",
            Self::UserStake => b"user_stake",
            Self::ThemeAgent => b"theme_agent",
            Self::AgentVault => b"agent_vault",
            Self::AgentVaultAuthority => b"agent_vault_authority",
            Self::AgentPerf => b"agent_perf",
        }
    }

    /// Expected identifier widths following the tag.
    #[must_use]
    pub fn seed_widths(&self) -> &'static [SeedWidth] {
        use SeedWidth::{Pubkey, U16, U64};
        match self {
            Self::Config => &[U16],
            Self::Agent | Self::AgentPerf => &[U16, U16],
            Self::Theme => &[U16, U64],
            Self::ThemeAgent | Self::AgentVault | Self::AgentVaultAuthority => &[U64, U16],
            Self::UserStake => &[U64, U16, Pubkey],
        }
    }

    /// Derive this namespace's address for the given identifier tuple.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSeed`] if the tuple does not match
    /// [`Namespace::seed_widths`], or [`Error::AddressDerivation`] if the
    /// bump search is exhausted.
    pub fn derive(&self, program_id: &Pubkey, parts: &[SeedPart]) -> Result<DerivedAddress> {
        let expected = self.seed_widths();
        if parts.len() != expected.len() {
            return Err(Error::InvalidSeed(format!(
                "{self} expects {} identifier(s), got {}",
                expected.len(),
                parts.len()
            )));
        }
        for (index, (part, width)) in parts.iter().zip(expected).enumerate() {
            if part.width() != *width {
                return Err(Error::InvalidSeed(format!(
                    "{self} identifier {index} must be {width}, got {}",
                    part.width()
                )));
            }
        }

        let (address, bump) = derive(program_id, self.tag(), parts)?;
        Ok(DerivedAddress {
            namespace: *self,
            address,
            bump,
        })
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.tag()))
    }
}

/// A resolved address together with the bump that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddress {
    /// Kind of account.
    pub namespace: Namespace,
    /// Program-derived address.
    pub address: Pubkey,
    /// Bump seed found by the search.
    pub bump: u8,
}

/// Derive a program address from a tag and identifier tuple.
///
/// Untyped: no width checking beyond the ledger's seed limits. Prefer
/// [`Namespace::derive`] for program accounts.
///
/// # Errors
///
/// Returns an error if a seed is too long, there are too many seeds, or no
/// bump yields an off-curve address.
pub fn derive(program_id: &Pubkey, tag: &[u8], parts: &[SeedPart]) -> Result<(Pubkey, u8)> {
    let encoded: Vec<Vec<u8>> = parts.iter().map(SeedPart::to_bytes).collect();
    let mut seeds: Vec<&[u8]> = Vec::with_capacity(encoded.len() + 1);
    seeds.push(tag);
    seeds.extend(encoded.iter().map(Vec::as_slice));
    derive_raw(program_id, &seeds)
}

/// Derive a program address from pre-encoded seeds.
///
/// # Errors
///
/// See [`derive`].
pub fn derive_raw(program_id: &Pubkey, seeds: &[&[u8]]) -> Result<(Pubkey, u8)> {
    // One slot is reserved for the bump.
    if seeds.len() >= MAX_SEEDS {
        return Err(Error::InvalidSeed(format!(
            "{} seeds exceeds the limit of {}",
            seeds.len(),
            MAX_SEEDS - 1
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(Error::InvalidSeed(format!(
            "seed of {} bytes exceeds {MAX_SEED_LEN}",
            seed.len()
        )));
    }

    Pubkey::try_find_program_address(seeds, program_id).ok_or_else(|| {
        Error::AddressDerivation(format!(
            "no valid bump for seeds {} under program {program_id}",
            seeds
                .iter()
                .map(hex::encode)
                .collect::<Vec<_>>()
                .join(",")
        ))
    })
}

/// Associated token account of `owner` for `mint`.
///
/// # Errors
///
/// See [`derive_raw`].
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
    let (address, _) = derive_raw(
        &programs::ASSOCIATED_TOKEN_PROGRAM_ID,
        &[
            owner.as_ref(),
            programs::TOKEN_PROGRAM_ID.as_ref(),
            mint.as_ref(),
        ],
    )?;
    Ok(address)
}

/// Typed resolver bound to one program deployment and config id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressBook {
    program_id: Pubkey,
    config_id: u16,
}

impl AddressBook {
    /// Create a resolver for the given deployment.
    #[must_use]
    pub fn new(program_id: Pubkey, config_id: u16) -> Self {
        Self {
            program_id,
            config_id,
        }
    }

    /// Program that owns every derived account.
    #[must_use]
    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Config id this book resolves under.
    #[must_use]
    pub fn config_id(&self) -> u16 {
        self.config_id
    }

    /// Global config account.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn config(&self) -> Result<DerivedAddress> {
        Namespace::Config.derive(&self.program_id, &[SeedPart::U16(self.config_id)])
    }

    /// Theme (market) account.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn theme(&self, theme_id: u64) -> Result<DerivedAddress> {
        Namespace::Theme.derive(
            &self.program_id,
            &[SeedPart::U16(self.config_id), SeedPart::U64(theme_id)],
        )
    }

    /// Agent account.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn agent(&self, agent_id: u16) -> Result<DerivedAddress> {
        Namespace::Agent.derive(
            &self.program_id,
            &[SeedPart::U16(self.config_id), SeedPart::U16(agent_id)],
        )
    }

    /// Agent performance account.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn agent_perf(&self, agent_id: u16) -> Result<DerivedAddress> {
        Namespace::AgentPerf.derive(
            &self.program_id,
            &[SeedPart::U16(self.config_id), SeedPart::U16(agent_id)],
        )
    }

    /// Theme/agent participation account.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn theme_agent(&self, theme_id: u64, agent_id: u16) -> Result<DerivedAddress> {
        Namespace::ThemeAgent.derive(
            &self.program_id,
            &[SeedPart::U64(theme_id), SeedPart::U16(agent_id)],
        )
    }

    /// Stake vault for a theme/agent pair.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn agent_vault(&self, theme_id: u64, agent_id: u16) -> Result<DerivedAddress> {
        Namespace::AgentVault.derive(
            &self.program_id,
            &[SeedPart::U64(theme_id), SeedPart::U16(agent_id)],
        )
    }

    /// Authority PDA of the stake vault.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn agent_vault_authority(&self, theme_id: u64, agent_id: u16) -> Result<DerivedAddress> {
        Namespace::AgentVaultAuthority.derive(
            &self.program_id,
            &[SeedPart::U64(theme_id), SeedPart::U16(agent_id)],
        )
    }

    /// Stake record of `user` for a theme/agent pair.
    ///
    /// # Errors
    ///
    /// Returns an error if derivation fails.
    pub fn user_stake(
        &self,
        theme_id: u64,
        agent_id: u16,
        user: &Pubkey,
    ) -> Result<DerivedAddress> {
        Namespace::UserStake.derive(
            &self.program_id,
            &[
                SeedPart::U64(theme_id),
                SeedPart::U16(agent_id),
                SeedPart::Pubkey(*user),
            ],
        )
    }
}
