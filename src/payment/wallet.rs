//! Ledger address parsing for payment receivers and beneficiaries.
//!
//! Addresses travel as base58 strings on the wire and in configuration.

use crate::error::{Error, Result};
use solana_sdk::pubkey::Pubkey;

/// Encoded length of a public key.
const ADDRESS_BYTES: usize = 32;

/// Longest base58 rendering of 32 bytes.
const MAX_BASE58_LEN: usize = 44;

/// Parse a base58 address string into a [`Pubkey`].
///
/// # Arguments
///
/// * `address` - base58 string (e.g. `"GNvCyZH..."`)
///
/// # Errors
///
/// Returns [`Error::Validation`] if the string is empty, too long, not base58,
/// or does not decode to exactly 32 bytes.
pub fn parse_address(address: &str) -> Result<Pubkey> {
    if address.is_empty() {
        return Err(Error::Validation("address is empty".into()));
    }

    if address.len() > MAX_BASE58_LEN {
        return Err(Error::Validation(format!(
            "invalid address length: at most {MAX_BASE58_LEN} characters, got {}",
            address.len()
        )));
    }

    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| Error::Validation(format!("invalid address {address}: {e}")))?;

    let bytes: [u8; ADDRESS_BYTES] = bytes.try_into().map_err(|raw: Vec<u8>| {
        Error::Validation(format!(
            "invalid address {address}: expected {ADDRESS_BYTES} bytes, got {}",
            raw.len()
        ))
    })?;

    Ok(Pubkey::new_from_array(bytes))
}

/// Check that an address string is well-formed.
#[must_use]
pub fn is_valid_address(address: &str) -> bool {
    parse_address(address).is_ok()
}

/// Receiving side of the payment gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentWallet {
    /// Address settled payments are sent to.
    pub pay_to: Pubkey,
    /// Token mint payments are denominated in.
    pub asset: Pubkey,
    /// Fee payer the facilitator sponsors transfers with, if any.
    pub fee_payer: Option<Pubkey>,
}

impl PaymentWallet {
    /// Create a wallet from already parsed addresses.
    #[must_use]
    pub fn new(pay_to: Pubkey, asset: Pubkey, fee_payer: Option<Pubkey>) -> Self {
        Self {
            pay_to,
            asset,
            fee_payer,
        }
    }

    /// Build a wallet from string addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if any address is malformed.
    pub fn from_strings(pay_to: &str, asset: &str, fee_payer: Option<&str>) -> Result<Self> {
        Ok(Self {
            pay_to: parse_address(pay_to)?,
            asset: parse_address(asset)?,
            fee_payer: fee_payer.map(parse_address).transpose()?,
        })
    }
}
