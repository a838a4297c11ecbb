//! Relay and admin key material.
//!
//! Keys are loaded once at startup and passed explicitly to the operations
//! that sign. Neither `Debug` nor `Serialize` output ever contains secret
//! bytes, and load errors never echo the input.

use crate::error::{Error, Result};
use crate::redact::REDACTED;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::fmt;

/// Environment variable holding the relay key.
pub const RELAY_KEY_ENV: &str = "STAKE_RELAY_RELAY_KEY";

/// Environment variable holding the admin key.
pub const ADMIN_KEY_ENV: &str = "STAKE_RELAY_ADMIN_KEY";

/// Length of an ed25519 keypair (secret ++ public).
const KEYPAIR_LEN: usize = 64;

/// Signing identities available to the relay.
pub struct RelayCredentials {
    relay: Keypair,
    admin: Option<Keypair>,
}

impl RelayCredentials {
    /// Wrap already loaded keys.
    #[must_use]
    pub fn new(relay: Keypair, admin: Option<Keypair>) -> Self {
        Self { relay, admin }
    }

    /// Load from [`RELAY_KEY_ENV`] (required) and [`ADMIN_KEY_ENV`] (optional).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if the relay key is missing or either
    /// key is malformed.
    pub fn from_env() -> Result<Self> {
        let relay = std::env::var(RELAY_KEY_ENV)
            .map_err(|_| Error::Credentials(format!("{RELAY_KEY_ENV} is not set")))?;
        let relay = parse_keypair(&relay)
            .map_err(|e| Error::Credentials(format!("{RELAY_KEY_ENV}: {e}")))?;

        let admin = match std::env::var(ADMIN_KEY_ENV) {
            Ok(raw) if !raw.trim().is_empty() => Some(
                parse_keypair(&raw)
                    .map_err(|e| Error::Credentials(format!("{ADMIN_KEY_ENV}: {e}")))?,
            ),
            _ => None,
        };

        Ok(Self { relay, admin })
    }

    /// Relay identity: pays fees and funds proxy stakes.
    #[must_use]
    pub fn relay(&self) -> &Keypair {
        &self.relay
    }

    /// Relay public key.
    #[must_use]
    pub fn relay_pubkey(&self) -> Pubkey {
        self.relay.pubkey()
    }

    /// Admin identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] if no admin key was configured.
    pub fn admin(&self) -> Result<&Keypair> {
        self.admin
            .as_ref()
            .ok_or_else(|| Error::Credentials(format!("{ADMIN_KEY_ENV} is not set")))
    }
}

impl fmt::Debug for RelayCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayCredentials")
            .field("relay", &self.relay.pubkey())
            .field("relay_secret", &REDACTED)
            .field("admin", &self.admin.as_ref().map(Keypair::pubkey))
            .field("admin_secret", &self.admin.as_ref().map(|_| REDACTED))
            .finish()
    }
}

impl Serialize for RelayCredentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RelayCredentials", 4)?;
        state.serialize_field("relay", &self.relay.pubkey().to_string())?;
        state.serialize_field("relaySecret", REDACTED)?;
        state.serialize_field(
            "admin",
            &self.admin.as_ref().map(|k| k.pubkey().to_string()),
        )?;
        state.serialize_field("adminSecret", &self.admin.as_ref().map(|_| REDACTED))?;
        state.end()
    }
}

/// Parse a keypair from base58 or a JSON byte array.
///
/// The error message never contains any part of `raw`.
///
/// # Errors
///
/// Returns [`Error::Credentials`] if the value is neither form or does not
/// hold a valid 64-byte keypair.
pub fn parse_keypair(raw: &str) -> Result<Keypair> {
    let raw = raw.trim();
    let bytes = if raw.starts_with('[') {
        serde_json::from_str::<Vec<u8>>(raw)
            .map_err(|_| Error::Credentials("key is not a JSON byte array".into()))?
    } else {
        bs58::decode(raw)
            .into_vec()
            .map_err(|_| Error::Credentials("key is not valid base58".into()))?
    };

    if bytes.len() != KEYPAIR_LEN {
        return Err(Error::Credentials(format!(
            "key must be {KEYPAIR_LEN} bytes, got {}",
            bytes.len()
        )));
    }

    Keypair::from_bytes(&bytes)
        .map_err(|_| Error::Credentials("key bytes are not a valid keypair".into()))
}
