//! The request client against a mock gateway.

use alloy_primitives::{address, Bytes};
use evm_lab::{
    test_utils::{call_request, create_request, DEPLOYER},
    OperationResponse,
};
use evm_lab_cli::{client::GatewayClient, Error};
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_deploy_posts_to_create_contract() {
    let server = MockServer::start().await;
    let created = address!("5fbdb2315678afecb367f032d93f642f64180aa3");
    Mock::given(method("POST"))
        .and(path("/create_contract"))
        .and(body_partial_json(json!({ "codeAndInput": "0x6000", "gasPrice": "0" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "addr": created,
            "result": "0x",
            "errMsg": "",
            "gasUsed": 53000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri());
    let response =
        client.deploy(&create_request(Bytes::from_static(&[0x60, 0x00]))).await.unwrap();
    assert_eq!(
        response,
        OperationResponse { addr: Some(created), gas_used: 53_000, ..Default::default() }
    );
}

#[tokio::test]
async fn test_call_posts_to_call_contract() {
    let server = MockServer::start().await;
    let receiver = address!("00000000000000000000000000000000000000bb");
    Mock::given(method("POST"))
        .and(path("/call_contract"))
        .and(body_partial_json(json!({ "sender": DEPLOYER, "receiver": receiver })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": "0x2a",
            "errMsg": "",
            "gasUsed": 21000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = GatewayClient::new(server.uri())
        .call(&call_request(receiver, Bytes::new()))
        .await
        .unwrap();
    assert_eq!(response.result, Bytes::from_static(&[0x2a]));
    assert!(response.addr.is_none());
}

#[tokio::test]
async fn test_rejection_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/create_contract"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "no concurrent allowed" })),
        )
        .mount(&server)
        .await;

    let err = GatewayClient::new(server.uri())
        .deploy(&create_request(Bytes::new()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Server { status: 400, ref message } if message == "no concurrent allowed"
    ));
}
