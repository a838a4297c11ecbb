//! Fixed-offset account layouts of the stake program.
//!
//! The program publishes its account layouts in its interface description;
//! the relay only needs a handful of fields out of them. Offsets live here and
//! nowhere else, tagged with [`LAYOUT_VERSION`]. When the program is upgraded,
//! bump the version and re-pin the fixture tests below: a stale offset decodes
//! garbage without any type error.

use crate::error::{Error, Result};
use solana_sdk::pubkey::Pubkey;

/// Version of the program interface these layouts were taken from.
pub const LAYOUT_VERSION: u32 = 1;

/// Length of the account discriminator prefix.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Primitive type stored at a field offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 1 byte.
    U8,
    /// 2 bytes, little-endian.
    U16,
    /// 8 bytes, little-endian.
    U64,
    /// 32 bytes.
    Pubkey,
}

impl FieldKind {
    /// Encoded width in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U64 => 8,
            Self::Pubkey => 32,
        }
    }
}

/// One named field of an account layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as published by the program.
    pub name: &'static str,
    /// Byte offset from the start of account data (discriminator included).
    pub offset: usize,
    /// Stored type.
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn new(name: &'static str, offset: usize, kind: FieldKind) -> Self {
        Self { name, offset, kind }
    }
}

/// Versioned layout of one account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountLayout {
    /// Account type name.
    pub name: &'static str,
    /// Interface version the offsets belong to.
    pub version: u32,
    /// Expected first eight bytes of account data.
    pub discriminator: [u8; DISCRIMINATOR_LEN],
    /// Decodable fields.
    pub fields: &'static [FieldSpec],
}

/// `Config` account, interface version 1.
pub const CONFIG_LAYOUT: AccountLayout = AccountLayout {
    name: "Config",
    version: LAYOUT_VERSION,
    // sha256("account:Config")[..8]
    discriminator: [155, 12, 170, 224, 30, 250, 204, 130],
    fields: &[
        FieldSpec::new("admin", 8, FieldKind::Pubkey),
        FieldSpec::new("treasury", 40, FieldKind::Pubkey),
        FieldSpec::new("stake_mint", 72, FieldKind::Pubkey),
        FieldSpec::new("oracle", 104, FieldKind::Pubkey),
        FieldSpec::new("config_id", 136, FieldKind::U16),
        FieldSpec::new("min_stake_amount", 138, FieldKind::U64),
        FieldSpec::new("bump", 146, FieldKind::U8),
        FieldSpec::new("paused", 147, FieldKind::U8),
        FieldSpec::new("next_agent_id", 148, FieldKind::U16),
    ],
};

impl AccountLayout {
    /// Smallest data length that contains every field.
    #[must_use]
    pub fn min_len(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.offset + f.kind.width())
            .max()
            .unwrap_or(DISCRIMINATOR_LEN)
    }

    /// Check discriminator and length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] if the data is too short or belongs to a
    /// different account type.
    pub fn check(&self, data: &[u8]) -> Result<()> {
        if data.len() < self.min_len() {
            return Err(Error::Layout(format!(
                "{} v{}: expected at least {} bytes, got {}",
                self.name,
                self.version,
                self.min_len(),
                data.len()
            )));
        }
        if data[..DISCRIMINATOR_LEN] != self.discriminator {
            return Err(Error::Layout(format!(
                "{} v{}: discriminator mismatch ({})",
                self.name,
                self.version,
                hex::encode(&data[..DISCRIMINATOR_LEN])
            )));
        }
        Ok(())
    }

    fn field_bytes<'a>(&self, data: &'a [u8], name: &str, kind: FieldKind) -> Result<&'a [u8]> {
        let field = self
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::Layout(format!("{} has no field {name}", self.name)))?;
        if field.kind != kind {
            return Err(Error::Layout(format!(
                "{}.{name} is {:?}, read as {kind:?}",
                self.name, field.kind
            )));
        }
        self.check(data)?;
        Ok(&data[field.offset..field.offset + kind.width()])
    }

    /// Read a `u8` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] on unknown field, type mismatch or bad data.
    pub fn read_u8(&self, data: &[u8], name: &str) -> Result<u8> {
        Ok(self.field_bytes(data, name, FieldKind::U8)?[0])
    }

    /// Read a little-endian `u16` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] on unknown field, type mismatch or bad data.
    pub fn read_u16(&self, data: &[u8], name: &str) -> Result<u16> {
        let bytes = self.field_bytes(data, name, FieldKind::U16)?;
        let mut buf = [0u8; 2];
        buf.copy_from_slice(bytes);
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a little-endian `u64` field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] on unknown field, type mismatch or bad data.
    pub fn read_u64(&self, data: &[u8], name: &str) -> Result<u64> {
        let bytes = self.field_bytes(data, name, FieldKind::U64)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    /// Read a public key field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] on unknown field, type mismatch or bad data.
    pub fn read_pubkey(&self, data: &[u8], name: &str) -> Result<Pubkey> {
        let bytes = self.field_bytes(data, name, FieldKind::Pubkey)?;
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        Ok(Pubkey::new_from_array(buf))
    }
}

/// Fields of the config account the relay acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigAccount {
    /// Administrator allowed to register agents.
    pub admin: Pubkey,
    /// Mint of the staked asset.
    pub stake_mint: Pubkey,
    /// Smallest accepted stake, in smallest units.
    pub min_stake_amount: u64,
    /// Whether staking is paused.
    pub paused: bool,
    /// Id the next registered agent receives.
    pub next_agent_id: u16,
}

impl ConfigAccount {
    /// Decode from raw config account bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Layout`] if the bytes do not match [`CONFIG_LAYOUT`].
    pub fn decode(data: &[u8]) -> Result<Self> {
        let layout = &CONFIG_LAYOUT;
        Ok(Self {
            admin: layout.read_pubkey(data, "admin")?,
            stake_mint: layout.read_pubkey(data, "stake_mint")?,
            min_stake_amount: layout.read_u64(data, "min_stake_amount")?,
            paused: layout.read_u8(data, "paused")? != 0,
            next_agent_id: layout.read_u16(data, "next_agent_id")?,
        })
    }

    /// Encode into a buffer laid out like the on-chain account.
    ///
    /// Used to build fixtures for local ledgers.
    #[must_use]
    pub fn encode(&self, config_id: u16) -> Vec<u8> {
        let mut data = vec![0u8; CONFIG_LAYOUT.min_len()];
        data[..DISCRIMINATOR_LEN].copy_from_slice(&CONFIG_LAYOUT.discriminator);
        data[8..40].copy_from_slice(self.admin.as_ref());
        data[72..104].copy_from_slice(self.stake_mint.as_ref());
        data[136..138].copy_from_slice(&config_id.to_le_bytes());
        data[138..146].copy_from_slice(&self.min_stake_amount.to_le_bytes());
        data[147] = u8::from(self.paused);
        data[148..150].copy_from_slice(&self.next_agent_id.to_le_bytes());
        data
    }
}
