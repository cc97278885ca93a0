//! Client and server talking over a real socket.

use std::sync::Arc;

use alloy_primitives::U256;
use evm_lab::{
    test_utils::{call_request, create_request, deploy_code, DEPLOYER, STORE_42_RUNTIME},
    Gateway, LabConfig,
};
use evm_lab_cli::{client::GatewayClient, server::serve};
use tokio::net::TcpListener;

#[tokio::test]
async fn test_deploy_and_call_over_http() {
    let config: LabConfig = serde_json::from_str(r#"{ "statDump": true }"#).unwrap();
    let gateway = Arc::new(Gateway::from_config(&config).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(gateway, listener));

    let client = GatewayClient::new(format!("http://{addr}"));
    let deployed = client.deploy(&create_request(deploy_code(STORE_42_RUNTIME))).await.unwrap();
    assert!(deployed.is_success(), "{}", deployed.err_msg);
    assert_eq!(deployed.addr, Some(DEPLOYER.create(0)));
    assert_eq!(deployed.stats.unwrap().samples, 1);

    let called = client
        .call(&call_request(deployed.addr.unwrap(), Default::default()))
        .await
        .unwrap();
    assert_eq!(U256::from_be_slice(&called.result), U256::from(42));
}
