//! Remote facilitator that verifies and settles payment proofs.

use crate::error::{Error, Result};
use crate::payment::quote::{RequirementDescriptor, X402_VERSION};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Decoded `X-PAYMENT` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version the client used.
    pub x402_version: u8,
    /// Payment scheme.
    pub scheme: String,
    /// Network identifier.
    pub network: String,
    /// Scheme-specific proof (for `exact` on Solana: a partially signed transfer).
    pub payload: serde_json::Value,
}

impl PaymentPayload {
    /// Decode a raw header value (base64 of the JSON payload).
    ///
    /// # Errors
    ///
    /// Returns [`Error::PaymentRejected`] if the value is not base64 JSON of
    /// the expected shape.
    pub fn from_header(value: &str) -> Result<Self> {
        let raw = BASE64
            .decode(value.trim())
            .map_err(|e| Error::PaymentRejected(format!("payment header is not base64: {e}")))?;
        serde_json::from_slice(&raw)
            .map_err(|e| Error::PaymentRejected(format!("malformed payment payload: {e}")))
    }

    /// Encode into a header value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the payload cannot be encoded.
    pub fn to_header(&self) -> Result<String> {
        let json =
            serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(BASE64.encode(json))
    }
}

/// Request body for both facilitator endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorRequest {
    /// Protocol version.
    pub x402_version: u8,
    /// Decoded proof.
    pub payment_payload: PaymentPayload,
    /// Requirement the proof must satisfy.
    pub payment_requirements: RequirementDescriptor,
}

/// Facilitator verdict on a proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    /// Whether the proof satisfies the requirement.
    pub is_valid: bool,
    /// Reason when invalid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// Paying address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Outcome of a settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    /// Whether funds moved.
    pub success: bool,
    /// Reason when not settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    /// Settlement transaction signature.
    #[serde(default)]
    pub transaction: String,
    /// Network the transfer settled on.
    #[serde(default)]
    pub network: String,
    /// Paying address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

/// Verifies and settles proofs.
///
/// Transport failures must surface as [`Error::FacilitatorUnavailable`] and
/// never as an invalid verdict.
#[async_trait]
pub trait Facilitator: Send + Sync {
    /// Check a proof against a requirement without moving funds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FacilitatorUnavailable`] if no verdict was obtained.
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirement: &RequirementDescriptor,
    ) -> Result<VerifyResponse>;

    /// Move funds as described by a verified proof.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FacilitatorUnavailable`] if no outcome was obtained.
    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirement: &RequirementDescriptor,
    ) -> Result<SettleResponse>;
}

/// Facilitator reached over HTTP.
pub struct HttpFacilitator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpFacilitator {
    /// Create a client for the facilitator at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("stake-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("facilitator client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Facilitator base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &PaymentPayload,
        requirement: &RequirementDescriptor,
    ) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload: payload.clone(),
            payment_requirements: requirement.clone(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Facilitator {endpoint} request failed: {e}");
                Error::FacilitatorUnavailable(format!("{endpoint}: {e}"))
            })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            Error::FacilitatorUnavailable(format!("{endpoint}: reading response: {e}"))
        })?;
        debug!("Facilitator {endpoint} answered {status} ({} bytes)", bytes.len());

        // A 4xx carrying a well-formed verdict is still a verdict.
        match serde_json::from_slice::<T>(&bytes) {
            Ok(parsed) if !status.is_server_error() => Ok(parsed),
            _ => Err(Error::FacilitatorUnavailable(format!(
                "{endpoint}: unexpected response (HTTP {status})"
            ))),
        }
    }
}

#[async_trait]
impl Facilitator for HttpFacilitator {
    async fn verify(
        &self,
        payload: &PaymentPayload,
        requirement: &RequirementDescriptor,
    ) -> Result<VerifyResponse> {
        self.post("verify", payload, requirement).await
    }

    async fn settle(
        &self,
        payload: &PaymentPayload,
        requirement: &RequirementDescriptor,
    ) -> Result<SettleResponse> {
        self.post("settle", payload, requirement).await
    }
}
