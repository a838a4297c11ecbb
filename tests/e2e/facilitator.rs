//! HTTP facilitator client against a local fake facilitator.

#![allow(clippy::expect_used)]

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use stake_relay::error::Error;
use stake_relay::payment::{
    quote, Facilitator, GateDecision, HttpFacilitator, PaymentGate, PaymentGateConfig,
    PaymentPayload, PaymentRequirement, PaymentWallet, RequirementDescriptor, PAYMENT_HEADER,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Canned answers and a log of received bodies.
#[derive(Default)]
struct FakeState {
    verify: Mutex<Option<(StatusCode, Value)>>,
    settle: Mutex<Option<(StatusCode, Value)>>,
    received: Mutex<Vec<(&'static str, Value)>>,
}

async fn verify(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> impl IntoResponse {
    state.received.lock().push(("verify", body));
    let (status, answer) = state
        .verify
        .lock()
        .clone()
        .unwrap_or((StatusCode::OK, json!({ "isValid": true, "payer": "payer" })));
    (status, Json(answer))
}

async fn settle(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> impl IntoResponse {
    state.received.lock().push(("settle", body));
    let (status, answer) = state.settle.lock().clone().unwrap_or((
        StatusCode::OK,
        json!({
            "success": true,
            "transaction": "5settle",
            "network": "solana-devnet",
            "payer": "payer",
        }),
    ));
    (status, Json(answer))
}

async fn spawn_fake(state: Arc<FakeState>) -> SocketAddr {
    let app = Router::new()
        .route("/verify", post(verify))
        .route("/settle", post(settle))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn wallet() -> PaymentWallet {
    PaymentWallet::new(
        Pubkey::new_from_array([7; 32]),
        Pubkey::new_from_array([9; 32]),
        Some(Pubkey::new_from_array([3; 32])),
    )
}

fn descriptor() -> RequirementDescriptor {
    quote(&PaymentRequirement::new(
        5_000_000,
        &wallet(),
        "solana-devnet",
        "http://relay.test/api/stake",
        "Proxy stake",
        60,
    ))
}

fn payload() -> PaymentPayload {
    PaymentPayload {
        x402_version: 1,
        scheme: "exact".into(),
        network: "solana-devnet".into(),
        payload: json!({ "transaction": "AQAB" }),
    }
}

fn client(addr: SocketAddr) -> HttpFacilitator {
    HttpFacilitator::new(&format!("http://{addr}/"), Duration::from_secs(5)).expect("client")
}

#[tokio::test]
async fn test_verify_sends_payload_and_requirements() {
    let state = Arc::new(FakeState::default());
    let addr = spawn_fake(Arc::clone(&state)).await;

    let verdict = client(addr)
        .verify(&payload(), &descriptor())
        .await
        .expect("verify");
    assert!(verdict.is_valid);
    assert_eq!(verdict.payer.as_deref(), Some("payer"));

    let received = state.received.lock().clone();
    assert_eq!(received.len(), 1);
    let (endpoint, body) = &received[0];
    assert_eq!(*endpoint, "verify");
    assert_eq!(body["x402Version"], 1);
    assert_eq!(body["paymentPayload"]["scheme"], "exact");
    assert_eq!(body["paymentPayload"]["payload"]["transaction"], "AQAB");
    assert_eq!(body["paymentRequirements"]["maxAmountRequired"], "5000000");
    assert_eq!(
        body["paymentRequirements"]["payTo"],
        Pubkey::new_from_array([7; 32]).to_string()
    );
    assert_eq!(
        body["paymentRequirements"]["extra"]["feePayer"],
        Pubkey::new_from_array([3; 32]).to_string()
    );
}

#[tokio::test]
async fn test_client_error_with_verdict_is_a_verdict() {
    let state = Arc::new(FakeState::default());
    *state.verify.lock() = Some((
        StatusCode::BAD_REQUEST,
        json!({ "isValid": false, "invalidReason": "insufficient_funds" }),
    ));
    let addr = spawn_fake(Arc::clone(&state)).await;

    let verdict = client(addr)
        .verify(&payload(), &descriptor())
        .await
        .expect("verdict");
    assert!(!verdict.is_valid);
    assert_eq!(verdict.invalid_reason.as_deref(), Some("insufficient_funds"));
}

#[tokio::test]
async fn test_server_error_is_unavailable_not_invalid() {
    let state = Arc::new(FakeState::default());
    *state.settle.lock() = Some((
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": "rpc down" }),
    ));
    let addr = spawn_fake(Arc::clone(&state)).await;

    let err = client(addr)
        .settle(&payload(), &descriptor())
        .await
        .expect_err("500");
    assert!(matches!(err, Error::FacilitatorUnavailable(_)));
}

#[tokio::test]
async fn test_gate_over_http_settles_once() {
    let state = Arc::new(FakeState::default());
    let addr = spawn_fake(Arc::clone(&state)).await;
    let gate = PaymentGate::new(
        Arc::new(client(addr)),
        PaymentGateConfig {
            wallet: wallet(),
            network: "solana-devnet".into(),
            resource: "http://relay.test/api/stake".into(),
            description: "Proxy stake".into(),
            max_timeout_secs: 60,
            guard_capacity: 8,
        },
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        PAYMENT_HEADER,
        payload().to_header().expect("encode").parse().expect("header"),
    );

    let payment = match gate.authorize(&headers, 5_000_000).await.expect("authorize") {
        GateDecision::Settled(payment) => payment,
        other => panic!("expected settlement, got {other:?}"),
    };
    assert_eq!(payment.receipt().transaction, "5settle");
    assert_eq!(payment.amount(), 5_000_000);

    let endpoints: Vec<_> = state.received.lock().iter().map(|(e, _)| *e).collect();
    assert_eq!(endpoints, vec!["verify", "settle"]);
}
