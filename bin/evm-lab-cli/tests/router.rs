//! Routes of the gateway, driven through the router without a socket.

use std::sync::{mpsc, Arc};

use alloy_primitives::U256;
use alloy_sol_types::{Revert, SolError};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use evm_lab::{
    test_utils::{deploy_code, revert_runtime, DEPLOYER, STORE_42_RUNTIME},
    ChainEnv, Gateway, OperationResponse, WorldState,
};
use evm_lab_cli::server::{router, ErrorBody};
use rstest::rstest;
use serde_json::{json, Value};
use tower::ServiceExt;

fn gateway() -> Arc<Gateway> {
    Arc::new(Gateway::new(WorldState::new(), ChainEnv::default()))
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

async fn send(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app.clone().oneshot(post(uri, body.to_string())).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn deploy_body(code: &[u8]) -> Value {
    json!({
        "sender": DEPLOYER,
        "codeAndInput": format!("0x{}", alloy_primitives::hex::encode(code)),
        "gas": 10_000_000,
        "gasPrice": "0",
        "value": "0"
    })
}

#[rstest]
#[case("/deploy", "/call")]
#[case("/create_contract", "/call_contract")]
#[tokio::test]
async fn test_deploy_then_call(#[case] deploy: &str, #[case] call: &str) {
    let app = router(gateway());

    let (status, body) = send(&app, deploy, deploy_body(&deploy_code(STORE_42_RUNTIME))).await;
    assert_eq!(status, StatusCode::OK);
    let deployed: OperationResponse = serde_json::from_value(body).unwrap();
    assert_eq!(deployed.err_msg, "");
    let contract = deployed.addr.unwrap();
    assert_eq!(contract, DEPLOYER.create(0));

    let (status, body) = send(
        &app,
        call,
        json!({ "sender": DEPLOYER, "receiver": contract, "input": "0x", "gas": 100_000 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("addr").is_none());
    let called: OperationResponse = serde_json::from_value(body).unwrap();
    assert_eq!(U256::from_be_slice(&called.result), U256::from(42));
}

#[tokio::test]
async fn test_revert_is_reported_in_band() {
    let app = router(gateway());
    let payload = Revert { reason: "insufficient balance".to_string() }.abi_encode();

    let (status, body) = send(&app, "/deploy", deploy_body(&revert_runtime(&payload))).await;
    assert_eq!(status, StatusCode::OK);
    let response: OperationResponse = serde_json::from_value(body).unwrap();
    assert!(response.err_msg.contains("Msg:'insufficient balance'"));
    assert_eq!(response.addr, Some(DEPLOYER.create(0)));
}

#[tokio::test]
async fn test_invalid_gas_price_is_bad_request() {
    let app = router(gateway());
    let mut body = deploy_body(&deploy_code(STORE_42_RUNTIME));
    body["gasPrice"] = json!("abc");

    let (status, body) = send(&app, "/deploy", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorBody = serde_json::from_value(body).unwrap();
    assert_eq!(error.message, "invalid gas price:abc");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = router(gateway());
    let response = app.oneshot(post("/call", "{ not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert!(!error.message.is_empty());
}

/// Keeps `gateway` admitted on another thread until the returned sender fires.
fn hold(gateway: Arc<Gateway>) -> (mpsc::Sender<()>, std::thread::JoinHandle<()>) {
    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let holder = std::thread::spawn(move || {
        gateway
            .inspect(|_| {
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
            .unwrap();
    });
    held_rx.recv().unwrap();
    (release_tx, holder)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_gateway_rejects_immediately() {
    let gateway = gateway();
    let app = router(gateway.clone());

    let (release, holder) = hold(gateway);
    let (status, body) = send(&app, "/deploy", deploy_body(&deploy_code(STORE_42_RUNTIME))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "message": "no concurrent allowed" }));

    release.send(()).unwrap();
    holder.join().unwrap();

    let (status, _) = send(&app, "/deploy", deploy_body(&deploy_code(STORE_42_RUNTIME))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_busy_gateway_rejects_before_reading_the_body() {
    let gateway = gateway();
    let app = router(gateway.clone());

    let (release, holder) = hold(gateway);
    for uri in ["/deploy", "/call"] {
        let response = app.clone().oneshot(post(uri, "{ not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error.message, "no concurrent allowed");
    }
    release.send(()).unwrap();
    holder.join().unwrap();

    // once free, the same body fails on its own merits
    let response = app.oneshot(post("/call", "{ not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let error: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_ne!(error.message, "no concurrent allowed");
}
