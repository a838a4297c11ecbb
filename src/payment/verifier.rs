//! Payment gate: quote, verify, settle.
//!
//! ```text
//! RECEIVED ──(no proof)──▶ QUOTED (402)
//!    │
//!    └─(proof)──▶ VERIFYING ──(invalid)──▶ REJECTED (402)
//!                     │
//!                     └─(valid)──▶ SETTLING ──(failed)──▶ error
//!                                     │
//!                                     └─(settled)──▶ SettledPayment
//! ```
//!
//! Only this module can construct a [`SettledPayment`], and the stake
//! pipeline requires one, so no code path reaches submission without a
//! settled proof for the current request.

use crate::error::{Error, Result};
use crate::payment::facilitator::{Facilitator, PaymentPayload, SettleResponse};
use crate::payment::guard::SettledProofGuard;
use crate::payment::quote::{
    quote, PaymentRequiredBody, PaymentRequirement, RequirementDescriptor, SCHEME_EXACT,
};
use crate::payment::wallet::PaymentWallet;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Request header carrying the payment proof.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Response header carrying the encoded settlement outcome.
pub const PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

/// Static parameters of the gate.
#[derive(Debug, Clone)]
pub struct PaymentGateConfig {
    /// Where payments go and in which asset.
    pub wallet: PaymentWallet,
    /// Network identifier advertised in requirements.
    pub network: String,
    /// Resource identifier advertised in requirements.
    pub resource: String,
    /// Description advertised in requirements.
    pub description: String,
    /// Seconds a client has to complete payment.
    pub max_timeout_secs: u64,
    /// Proofs remembered by the replay guard.
    pub guard_capacity: usize,
}

/// Evidence that settlement succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReceipt {
    /// Settlement transaction signature.
    pub transaction: String,
    /// Network the payment settled on.
    pub network: String,
    /// Paying address, if reported.
    pub payer: Option<String>,
    /// Base64 settle response for the `X-PAYMENT-RESPONSE` header.
    pub header_value: String,
}

/// A payment that has been verified and settled for this request.
#[derive(Debug)]
pub struct SettledPayment {
    receipt: SettlementReceipt,
    amount: u64,
}

impl SettledPayment {
    pub(crate) fn new(receipt: SettlementReceipt, amount: u64) -> Self {
        Self { receipt, amount }
    }

    /// Settlement receipt.
    #[must_use]
    pub fn receipt(&self) -> &SettlementReceipt {
        &self.receipt
    }

    /// Amount paid, in smallest units.
    #[must_use]
    pub fn amount(&self) -> u64 {
        self.amount
    }
}

/// Result of running a request through the gate.
#[derive(Debug)]
pub enum GateDecision {
    /// No proof presented; answer 402 with this body.
    Quoted(PaymentRequiredBody),
    /// Proof presented but refused; answer 402 with this body.
    Rejected(PaymentRequiredBody),
    /// Paid. Proceed with the protected action.
    Settled(SettledPayment),
}

/// Raw payment proof from request headers, if any.
///
/// A header that is not valid UTF-8 is still returned (lossily decoded) so it
/// is rejected as malformed rather than treated as absent.
#[must_use]
pub fn extract_proof(headers: &HeaderMap) -> Option<String> {
    headers
        .get(PAYMENT_HEADER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Payment gate in front of the stake action.
pub struct PaymentGate {
    facilitator: Arc<dyn Facilitator>,
    guard: SettledProofGuard,
    config: PaymentGateConfig,
}

impl PaymentGate {
    /// Create a gate over a facilitator.
    #[must_use]
    pub fn new(facilitator: Arc<dyn Facilitator>, config: PaymentGateConfig) -> Self {
        let guard = SettledProofGuard::new(config.guard_capacity);
        info!(
            "Payment gate initialized (network={}, pay_to={}, asset={})",
            config.network, config.wallet.pay_to, config.wallet.asset
        );
        Self {
            facilitator,
            guard,
            config,
        }
    }

    /// Requirement for a request costing `amount` smallest units.
    #[must_use]
    pub fn requirement(&self, amount: u64) -> PaymentRequirement {
        PaymentRequirement::new(
            amount,
            &self.config.wallet,
            self.config.network.clone(),
            self.config.resource.clone(),
            self.config.description.clone(),
            self.config.max_timeout_secs,
        )
    }

    /// Replay guard shared by this gate.
    #[must_use]
    pub fn guard(&self) -> &SettledProofGuard {
        &self.guard
    }

    /// Run the gate for one request.
    ///
    /// # Arguments
    ///
    /// * `headers` - inbound request headers
    /// * `amount` - price in smallest units
    ///
    /// # Errors
    ///
    /// Returns [`Error::FacilitatorUnavailable`] when no verdict or settlement
    /// outcome could be obtained, and [`Error::SettlementFailed`] when a
    /// verified proof did not settle.
    pub async fn authorize(&self, headers: &HeaderMap, amount: u64) -> Result<GateDecision> {
        let descriptor = quote(&self.requirement(amount));

        let Some(proof) = extract_proof(headers) else {
            debug!("No payment proof; quoting {amount}");
            return Ok(GateDecision::Quoted(PaymentRequiredBody::new(
                format!("{PAYMENT_HEADER} header is required"),
                descriptor,
            )));
        };

        let payload = match self.decode(&proof, &descriptor) {
            Ok(payload) => payload,
            Err(e) => return Ok(self.reject(&e, descriptor)),
        };

        let claim = match self.guard.claim(&proof) {
            Ok(claim) => claim,
            Err(e) => return Ok(self.reject(&e, descriptor)),
        };

        let verdict = self.facilitator.verify(&payload, &descriptor).await?;
        if !verdict.is_valid {
            let reason = verdict
                .invalid_reason
                .unwrap_or_else(|| "payment proof is invalid".to_string());
            return Ok(self.reject(&Error::PaymentRejected(reason), descriptor));
        }

        let settled = match self.facilitator.settle(&payload, &descriptor).await {
            Ok(settled) => settled,
            Err(e) => {
                // Funds may have moved: never hand this proof out again.
                warn!("Settlement outcome unknown: {e}");
                claim.consume();
                return Err(e);
            }
        };

        if !settled.success {
            let reason = settled
                .error_reason
                .unwrap_or_else(|| "settlement was not completed".to_string());
            warn!("Settlement failed: {reason}");
            return Err(Error::SettlementFailed(reason));
        }

        claim.consume();
        let receipt = receipt(&settled)?;
        info!(
            "Payment of {amount} settled in {} (payer={})",
            receipt.transaction,
            receipt.payer.as_deref().unwrap_or("unknown")
        );
        Ok(GateDecision::Settled(SettledPayment::new(receipt, amount)))
    }

    fn decode(&self, proof: &str, descriptor: &RequirementDescriptor) -> Result<PaymentPayload> {
        let payload = PaymentPayload::from_header(proof)?;
        if payload.scheme != SCHEME_EXACT {
            return Err(Error::PaymentRejected(format!(
                "unsupported scheme {}",
                payload.scheme
            )));
        }
        if payload.network != descriptor.network {
            return Err(Error::PaymentRejected(format!(
                "payment is for network {}, expected {}",
                payload.network, descriptor.network
            )));
        }
        Ok(payload)
    }

    fn reject(&self, error: &Error, descriptor: RequirementDescriptor) -> GateDecision {
        warn!("Payment refused: {error}");
        GateDecision::Rejected(PaymentRequiredBody::new(error.to_string(), descriptor))
    }
}

fn receipt(settled: &SettleResponse) -> Result<SettlementReceipt> {
    let json = serde_json::to_vec(settled).map_err(|e| Error::Serialization(e.to_string()))?;
    Ok(SettlementReceipt {
        transaction: settled.transaction.clone(),
        network: settled.network.clone(),
        payer: settled.payer.clone(),
        header_value: BASE64.encode(json),
    })
}
