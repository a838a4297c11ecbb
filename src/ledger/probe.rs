//! Live account existence checks.

use super::LedgerRpc;
use crate::error::Result;
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of probing one address. Never cached across requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistenceRecord {
    /// Probed address.
    pub address: Pubkey,
    /// Raw account bytes if the account exists.
    pub data: Option<Vec<u8>>,
}

impl ExistenceRecord {
    /// Whether an account exists at the address.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }
}

/// Asks the ledger whether accounts exist.
#[derive(Clone)]
pub struct AccountProber {
    ledger: Arc<dyn LedgerRpc>,
}

impl AccountProber {
    /// Create a prober over the given ledger.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }

    /// Probe a single address with one read-only round trip.
    ///
    /// No retries here: the caller owns retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rpc`] if the ledger could not be queried. That is
    /// distinct from the account being absent.
    pub async fn probe(&self, address: &Pubkey) -> Result<ExistenceRecord> {
        match self.ledger.get_account_data(address).await {
            Ok(data) => {
                debug!(
                    "Probed {address}: {}",
                    data.as_ref()
                        .map_or_else(|| "absent".to_string(), |d| format!("{} bytes", d.len()))
                );
                Ok(ExistenceRecord {
                    address: *address,
                    data,
                })
            }
            Err(e) => {
                warn!("Probe of {address} failed: {e}");
                Err(e)
            }
        }
    }

    /// Probe several addresses in order.
    ///
    /// # Errors
    ///
    /// Fails on the first RPC error.
    pub async fn probe_all(&self, addresses: &[Pubkey]) -> Result<Vec<ExistenceRecord>> {
        let mut records = Vec::with_capacity(addresses.len());
        for address in addresses {
            records.push(self.probe(address).await?);
        }
        Ok(records)
    }
}
