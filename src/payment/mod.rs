//! Micropayment gate for stake-relay.
//!
//! Every stake request is priced in the stake asset and must be paid through
//! an x402-style challenge/response exchange before anything touches the
//! ledger:
//!
//! ```text
//! POST /api/stake
//!        │
//!        ▼
//! ┌─────────────────────┐   no X-PAYMENT    ┌──────────────┐
//! │ extract proof       │──────────────────▶│ 402 + quote  │
//! └─────────┬───────────┘                   └──────────────┘
//!           │
//!           ▼
//! ┌─────────────────────┐   invalid         ┌──────────────┐
//! │ facilitator verify  │──────────────────▶│ 402 rejected │
//! └─────────┬───────────┘                   └──────────────┘
//!           │
//!           ▼
//! ┌─────────────────────┐
//! │ facilitator settle  │──▶ SettledPayment ──▶ stake pipeline
//! └─────────────────────┘
//! ```
//!
//! # Payment Flow
//!
//! 1. Client posts a stake request without a proof and receives the quote
//! 2. Client builds a transfer matching the quote and encodes it as `X-PAYMENT`
//! 3. Gate verifies the proof with the facilitator
//! 4. Gate settles through the facilitator and only then hands off the request

pub mod amount;
pub mod facilitator;
pub mod guard;
pub mod quote;
mod verifier;
pub mod wallet;

pub use amount::{from_smallest_unit, to_smallest_unit};
pub use facilitator::{
    Facilitator, HttpFacilitator, PaymentPayload, SettleResponse, VerifyResponse,
};
pub use guard::SettledProofGuard;
pub use quote::{quote, PaymentRequiredBody, PaymentRequirement, RequirementDescriptor};
pub use verifier::{
    extract_proof, GateDecision, PaymentGate, PaymentGateConfig, SettledPayment,
    SettlementReceipt, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER,
};
pub use wallet::{is_valid_address, parse_address, PaymentWallet};
