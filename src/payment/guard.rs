//! Process-local guard against settling the same payment proof twice.

use crate::error::{Error, Result};
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

/// SHA-256 of a raw payment header value.
pub type ProofDigest = [u8; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProofState {
    InFlight,
    Consumed,
}

/// Remembers proofs that are being settled or were settled.
///
/// Bounded by an LRU; a proof evicted from the guard falls back on the
/// facilitator's own replay protection.
#[derive(Clone)]
pub struct SettledProofGuard {
    entries: Arc<Mutex<LruCache<ProofDigest, ProofState>>>,
}

impl SettledProofGuard {
    /// Create a guard remembering up to `capacity` proofs (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Digest of a raw proof.
    #[must_use]
    pub fn digest(proof: &str) -> ProofDigest {
        Sha256::digest(proof.as_bytes()).into()
    }

    /// Claim a proof for settlement.
    ///
    /// Dropping the returned claim without calling [`ProofClaim::consume`]
    /// releases the proof so a later request may use it again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PaymentRejected`] if the proof is in flight or was
    /// already settled by this process.
    pub fn claim(&self, proof: &str) -> Result<ProofClaim> {
        let digest = Self::digest(proof);
        let mut entries = self.entries.lock();
        match entries.get(&digest) {
            Some(ProofState::InFlight) => Err(Error::PaymentRejected(
                "payment proof is already being settled".into(),
            )),
            Some(ProofState::Consumed) => Err(Error::PaymentRejected(
                "payment proof was already used".into(),
            )),
            None => {
                entries.put(digest, ProofState::InFlight);
                debug!("Claimed payment proof {}", hex::encode(&digest[..8]));
                Ok(ProofClaim {
                    digest,
                    entries: Arc::clone(&self.entries),
                    consumed: false,
                })
            }
        }
    }

    /// Whether the proof is currently claimed or consumed.
    #[must_use]
    pub fn contains(&self, proof: &str) -> bool {
        self.entries.lock().contains(&Self::digest(proof))
    }

    /// Number of remembered proofs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no proofs are remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Exclusive claim on a proof while it is verified and settled.
pub struct ProofClaim {
    digest: ProofDigest,
    entries: Arc<Mutex<LruCache<ProofDigest, ProofState>>>,
    consumed: bool,
}

impl ProofClaim {
    /// Mark the proof as spent. It can never be claimed again while remembered.
    pub fn consume(mut self) {
        self.entries.lock().put(self.digest, ProofState::Consumed);
        self.consumed = true;
    }
}

impl Drop for ProofClaim {
    fn drop(&mut self) {
        if self.consumed {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.peek(&self.digest) == Some(&ProofState::InFlight) {
            entries.pop(&self.digest);
        }
    }
}
