//! Payment requirement quoting.
//!
//! A requirement renders to the x402 v1 `exact` scheme descriptor. The
//! rendering is a pure function of its inputs: no timestamps, no nonces. A
//! client that retries with a proof built against an earlier quote therefore
//! matches the descriptor the gate verifies against.

use crate::payment::wallet::PaymentWallet;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

/// Protocol version spoken by the gate.
pub const X402_VERSION: u8 = 1;

/// Payment scheme: pay exactly the quoted amount.
pub const SCHEME_EXACT: &str = "exact";

/// What a single request costs and where the money goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequirement {
    /// Price in the asset's smallest unit.
    pub amount: u64,
    /// Token mint.
    pub asset: Pubkey,
    /// Receiving address.
    pub pay_to: Pubkey,
    /// Facilitator fee payer, advertised to clients that build the transfer.
    pub fee_payer: Option<Pubkey>,
    /// Network identifier (`solana`, `solana-devnet`).
    pub network: String,
    /// Resource the payment unlocks.
    pub resource: String,
    /// Human-readable description.
    pub description: String,
    /// Seconds the client has to complete payment.
    pub max_timeout_secs: u64,
}

impl PaymentRequirement {
    /// Requirement for `amount` smallest units paid into `wallet`.
    #[must_use]
    pub fn new(
        amount: u64,
        wallet: &PaymentWallet,
        network: impl Into<String>,
        resource: impl Into<String>,
        description: impl Into<String>,
        max_timeout_secs: u64,
    ) -> Self {
        Self {
            amount,
            asset: wallet.asset,
            pay_to: wallet.pay_to,
            fee_payer: wallet.fee_payer,
            network: network.into(),
            resource: resource.into(),
            description: description.into(),
            max_timeout_secs,
        }
    }
}

/// Wire form of a requirement, as listed under `accepts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementDescriptor {
    /// Always [`SCHEME_EXACT`].
    pub scheme: String,
    /// Network identifier.
    pub network: String,
    /// Amount in smallest units, as a decimal string.
    pub max_amount_required: String,
    /// Resource the payment unlocks.
    pub resource: String,
    /// Human-readable description.
    pub description: String,
    /// Response media type of the resource.
    pub mime_type: String,
    /// Receiving address.
    pub pay_to: String,
    /// Seconds the client has to complete payment.
    pub max_timeout_seconds: u64,
    /// Token mint.
    pub asset: String,
    /// Scheme-specific extras.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Body of a `402 Payment Required` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredBody {
    /// Protocol version.
    pub x402_version: u8,
    /// Why payment is (still) required.
    pub error: String,
    /// Acceptable ways to pay.
    pub accepts: Vec<RequirementDescriptor>,
}

/// Render a requirement into its wire descriptor.
#[must_use]
pub fn quote(requirement: &PaymentRequirement) -> RequirementDescriptor {
    RequirementDescriptor {
        scheme: SCHEME_EXACT.to_string(),
        network: requirement.network.clone(),
        max_amount_required: requirement.amount.to_string(),
        resource: requirement.resource.clone(),
        description: requirement.description.clone(),
        mime_type: "application/json".to_string(),
        pay_to: requirement.pay_to.to_string(),
        max_timeout_seconds: requirement.max_timeout_secs,
        asset: requirement.asset.to_string(),
        extra: requirement
            .fee_payer
            .map(|fee_payer| serde_json::json!({ "feePayer": fee_payer.to_string() })),
    }
}

impl PaymentRequiredBody {
    /// 402 body offering a single descriptor.
    #[must_use]
    pub fn new(error: impl Into<String>, descriptor: RequirementDescriptor) -> Self {
        Self {
            x402_version: X402_VERSION,
            error: error.into(),
            accepts: vec![descriptor],
        }
    }
}
