//! HTTP surface of the relay.
//!
//! | Route | Purpose |
//! |---|---|
//! | `POST /api/stake` | paid proxy stake |
//! | `GET /health` | liveness |

use crate::config::Cluster;
use crate::credentials::RelayCredentials;
use crate::error::{Error, Result};
use crate::payment::{
    extract_proof, parse_address, to_smallest_unit, GateDecision, PaymentGate,
    SettlementReceipt, PAYMENT_RESPONSE_HEADER,
};
use crate::redact::redact_secret_fields;
use crate::stake::{ProxyStake, StakeRelay};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared state of every handler.
pub struct AppState {
    /// Payment gate.
    pub gate: PaymentGate,
    /// Stake pipeline.
    pub relay: StakeRelay,
    /// Signing identities.
    pub credentials: Arc<RelayCredentials>,
    /// Decimals of the stake (and payment) asset.
    pub decimals: u8,
    /// Cluster for explorer links.
    pub cluster: Cluster,
}

/// Human-readable amount: a JSON number or a decimal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    /// `"5.0"`
    Text(String),
    /// `5.0`
    Number(serde_json::Number),
}

impl AmountInput {
    fn as_decimal(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Body of `POST /api/stake`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeRequest {
    /// Theme (market) id.
    pub theme_id: u64,
    /// Agent (outcome) id.
    pub agent_id: u16,
    /// Amount in whole units of the stake asset.
    pub amount: AmountInput,
    /// Beneficiary, base58.
    pub user_public_key: String,
}

impl StakeRequest {
    /// Validate and convert to a pipeline action.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a malformed amount or beneficiary.
    pub fn to_action(&self, decimals: u8) -> Result<ProxyStake> {
        let amount = to_smallest_unit(&self.amount.as_decimal(), decimals)?;
        if amount == 0 {
            return Err(Error::Validation("amount must be positive".into()));
        }
        let beneficiary = parse_address(&self.user_public_key)?;
        Ok(ProxyStake {
            theme_id: self.theme_id,
            agent_id: self.agent_id,
            amount,
            beneficiary,
        })
    }
}

/// Error response, optionally after a payment already settled.
pub struct ApiError {
    error: Error,
    settlement: Option<SettlementReceipt>,
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            error,
            settlement: None,
        }
    }
}

impl ApiError {
    fn after_settlement(error: Error, settlement: SettlementReceipt) -> Self {
        Self {
            error,
            settlement: Some(settlement),
        }
    }
}

/// HTTP status for an error.
#[must_use]
pub fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Validation(_) | Error::InvalidSeed(_) | Error::BelowMinimumStake { .. } => {
            StatusCode::BAD_REQUEST
        }
        Error::PaymentRejected(_) | Error::SettlementFailed(_) => StatusCode::PAYMENT_REQUIRED,
        Error::FacilitatorUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::Rpc(_) | Error::SubmissionRejected { .. } | Error::TransactionFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        Error::ConfirmationExpired { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::Config(_)
        | Error::AddressDerivation(_)
        | Error::Layout(_)
        | Error::Signing(_)
        | Error::Credentials(_)
        | Error::Io(_)
        | Error::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Internal error: {}", self.error);
            "internal error".to_string()
        } else {
            self.error.to_string()
        };

        let mut body = json!({ "success": false, "error": message });
        if let Error::ConfirmationExpired { signature, .. } = &self.error {
            body["status"] = json!("indeterminate");
            body["signature"] = json!(signature.to_string());
        }
        if let Error::TransactionFailed { signature, .. } = &self.error {
            body["signature"] = json!(signature.to_string());
        }

        let mut headers = HeaderMap::new();
        if let Some(receipt) = &self.settlement {
            body["paymentSettled"] = json!(true);
            body["settlementTransaction"] = json!(receipt.transaction);
            insert_payment_response(&mut headers, receipt);
        }

        (status, headers, Json(redact_secret_fields(body))).into_response()
    }
}

fn insert_payment_response(headers: &mut HeaderMap, receipt: &SettlementReceipt) {
    match HeaderValue::from_str(&receipt.header_value) {
        Ok(value) => {
            headers.insert(PAYMENT_RESPONSE_HEADER, value);
        }
        Err(e) => warn!("Settlement receipt is not a valid header value: {e}"),
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn stake(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<Response, ApiError> {
    let request: StakeRequest = serde_json::from_slice(&body)
        .map_err(|e| Error::Validation(format!("malformed request body: {e}")))?;
    let action = request.to_action(state.decimals)?;

    // Refuse stakes the program would reject before anyone pays for them.
    if extract_proof(&headers).is_some() {
        state.relay.preflight(&action).await?;
    }

    let payment = match state.gate.authorize(&headers, action.amount).await? {
        GateDecision::Quoted(body) | GateDecision::Rejected(body) => {
            return Ok((StatusCode::PAYMENT_REQUIRED, Json(body)).into_response());
        }
        GateDecision::Settled(payment) => payment,
    };

    match state
        .relay
        .proxy_stake(&state.credentials, &action, &payment)
        .await
    {
        Ok(submitted) => {
            let signature = submitted.signature.to_string();
            let mut response_headers = HeaderMap::new();
            insert_payment_response(&mut response_headers, payment.receipt());
            let body = json!({
                "success": true,
                "signature": signature,
                "explorerUrl": state.cluster.explorer_url(&signature),
                "settlementTransaction": payment.receipt().transaction,
            });
            Ok((StatusCode::OK, response_headers, Json(body)).into_response())
        }
        Err(e) => Err(ApiError::after_settlement(e, payment.receipt().clone())),
    }
}

/// Build the router.
pub fn router(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/api/stake", post(stake))
        .route("/health", get(health))
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(body_limit_bytes))
}

/// Serve until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`Error::Io`] if the listener cannot be bound or the server fails.
pub async fn serve<F>(listen_addr: SocketAddr, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!("Stake relay listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Stake relay stopped");
    Ok(())
}
