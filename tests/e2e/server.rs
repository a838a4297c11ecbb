//! HTTP surface end to end.

#![allow(clippy::expect_used)]

use super::mocks::Behaviour;
use super::{TestHarness, USER};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use stake_relay::payment::{PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};
use stake_relay::server::router;
use std::sync::Arc;
use tower::ServiceExt;

const BODY_LIMIT: usize = 16 * 1024;

fn stake_body(amount: Value) -> String {
    json!({
        "themeId": 1,
        "agentId": 0,
        "amount": amount,
        "userPublicKey": USER,
    })
    .to_string()
}

async fn post(harness: &TestHarness, body: String, proof: Option<String>) -> Response {
    let mut request = Request::post("/api/stake").header("content-type", "application/json");
    if let Some(proof) = proof {
        request = request.header(PAYMENT_HEADER, proof);
    }
    router(harness.state(), BODY_LIMIT)
        .oneshot(request.body(Body::from(body)).expect("request"))
        .await
        .expect("response")
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn test_unpaid_request_is_quoted_without_touching_the_ledger() {
    let harness = TestHarness::setup();
    let response = post(&harness, stake_body(json!(5.0)), None).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

    let body = json_body(response).await;
    assert_eq!(body["x402Version"], 1);
    let accepts = &body["accepts"][0];
    assert_eq!(accepts["scheme"], "exact");
    assert_eq!(accepts["network"], "solana-devnet");
    assert_eq!(accepts["maxAmountRequired"], "5000000");
    assert_eq!(accepts["asset"], harness.mint.to_string());

    assert_eq!(harness.ledger.calls(), 0);
    assert!(harness.facilitator.calls().is_empty());
}

#[tokio::test]
async fn test_paid_request_settles_then_stakes() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    let response = post(&harness, stake_body(json!("5.0")), Some(harness.proof())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(PAYMENT_RESPONSE_HEADER));

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    let signature = body["signature"].as_str().expect("signature");
    assert_eq!(signature, harness.ledger.sent()[0].signatures[0].to_string());
    assert!(body["explorerUrl"]
        .as_str()
        .expect("explorer")
        .ends_with("?cluster=devnet"));
    assert_eq!(body["settlementTransaction"], "settlement-0");

    assert_eq!(
        harness.facilitator.calls(),
        vec!["verify:5000000", "settle:5000000"]
    );
}

#[tokio::test]
async fn test_invalid_proof_never_reaches_the_ledger() {
    let harness = TestHarness::setup();
    *harness.facilitator.valid.lock() = false;

    let response = post(&harness, stake_body(json!(5)), Some(harness.proof())).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error")
        .contains("invalid_exact_svm_payload_transaction"));

    assert_eq!(harness.facilitator.calls(), vec!["verify:5000000"]);
    assert!(harness.ledger.sent().is_empty());
}

#[tokio::test]
async fn test_failed_settlement_never_reaches_the_ledger() {
    let harness = TestHarness::setup();
    *harness.facilitator.settle_ok.lock() = false;

    let response = post(&harness, stake_body(json!(5)), Some(harness.proof())).await;
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(harness.ledger.sent().is_empty());
}

#[tokio::test]
async fn test_unreachable_facilitator_is_service_unavailable() {
    let harness = TestHarness::setup();
    *harness.facilitator.unavailable.lock() = true;

    let response = post(&harness, stake_body(json!(5)), Some(harness.proof())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(harness.ledger.sent().is_empty());
}

#[tokio::test]
async fn test_replayed_proof_is_rejected() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    let state = harness.state();
    let proof = harness.proof();

    let mut statuses = Vec::new();
    for _ in 0..2 {
        let request = Request::post("/api/stake")
            .header("content-type", "application/json")
            .header(PAYMENT_HEADER, proof.clone())
            .body(Body::from(stake_body(json!(5))))
            .expect("request");
        let response = router(Arc::clone(&state), BODY_LIMIT)
            .oneshot(request)
            .await
            .expect("response");
        statuses.push(response.status());
    }

    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::PAYMENT_REQUIRED]);
    assert_eq!(harness.ledger.sent().len(), 1);
}

#[tokio::test]
async fn test_below_minimum_is_refused_before_payment() {
    let harness = TestHarness::setup();
    let response = post(&harness, stake_body(json!("0.5")), Some(harness.proof())).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(harness.facilitator.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unconfirmed_stake_after_payment_is_indeterminate() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness.ledger.script([Behaviour::NeverLand]);

    let response = post(&harness, stake_body(json!(5)), Some(harness.proof())).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(response.headers().contains_key(PAYMENT_RESPONSE_HEADER));

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["status"], "indeterminate");
    assert_eq!(body["paymentSettled"], true);
    assert_eq!(body["settlementTransaction"], "settlement-0");
    assert_eq!(
        body["signature"],
        harness.ledger.sent()[0].signatures[0].to_string()
    );

    let text = body.to_string();
    assert!(!text.contains(&harness.credentials.relay().to_base58_string()));
    let admin = harness.credentials.admin().expect("admin");
    assert!(!text.contains(&admin.to_base58_string()));
}

#[tokio::test]
async fn test_program_failure_after_payment_reports_settlement() {
    let harness = TestHarness::setup();
    harness.seed_pair(1, 0);
    harness
        .ledger
        .script([Behaviour::Refuse("insufficient funds for fee".into())]);

    let response = post(&harness, stake_body(json!(5)), Some(harness.proof())).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert_eq!(body["paymentSettled"], true);
    assert!(body.get("status").is_none());
}

#[tokio::test]
async fn test_malformed_requests_are_bad_requests() {
    let harness = TestHarness::setup();
    for body in [
        "{not json".to_string(),
        stake_body(json!("abc")),
        stake_body(json!(0)),
        json!({"themeId": 1, "agentId": 0, "amount": 5, "userPublicKey": "nope"}).to_string(),
    ] {
        let response = post(&harness, body, None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
    }
    assert_eq!(harness.ledger.calls(), 0);
}

#[tokio::test]
async fn test_oversized_body_is_refused() {
    let harness = TestHarness::setup();
    let response = router(harness.state(), 64)
        .oneshot(
            Request::post("/api/stake")
                .body(Body::from(stake_body(json!("5".repeat(128)))))
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_health() {
    let harness = TestHarness::setup();
    let response = router(harness.state(), BODY_LIMIT)
        .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}
