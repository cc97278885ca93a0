//! End-to-end tests of the gateway built from a configuration document.

use std::{
    sync::{Arc, Barrier},
    thread,
};

use alloy_primitives::{address, Address, Bytes, U256};
use evm_lab::{
    revm::primitives::hardfork::SpecId,
    test_utils::{call_request, create_request, deploy_code, DEPLOYER, STORE_42_RUNTIME},
    Gateway, GatewayError, LabConfig, OperationResponse,
};

const RECIPIENT: Address = address!("00000000000000000000000000000000000000cc");

fn config(json: &str) -> LabConfig {
    serde_json::from_str(json).unwrap()
}

fn funded_gateway() -> Gateway {
    Gateway::from_config(&config(
        r#"{
            "genesis": {
                "config": { "chainId": 1337, "londonBlock": 0 },
                "gasLimit": "0x1c9c380",
                "baseFeePerGas": "0x7",
                "alloc": {
                    "0x00000000000000000000000000000000000000aa": { "balance": "0xde0b6b3a7640000" }
                }
            }
        }"#,
    ))
    .unwrap()
}

#[test]
fn test_genesis_block_parameters() {
    let gateway = funded_gateway();
    assert_eq!(gateway.chain().chain_id, 1337);
    assert_eq!(gateway.chain().spec, SpecId::LONDON);
    assert_eq!(gateway.chain().gas_limit, 30_000_000);

    let balance = gateway.inspect(|state| state.balance(DEPLOYER)).unwrap();
    assert_eq!(balance, U256::from(1_000_000_000_000_000_000u128));
}

#[test]
fn test_value_transfer_commits_balances() {
    let gateway = funded_gateway();
    let mut request = call_request(RECIPIENT, Bytes::new());
    request.value = "1000".to_string();

    let response = gateway.call(request).unwrap();
    assert!(response.is_success(), "{}", response.err_msg);
    // a plain transfer runs no code, so it costs nothing
    assert_eq!(response.gas_used, 0);

    gateway
        .inspect(|state| {
            assert_eq!(state.balance(RECIPIENT), U256::from(1000));
            assert_eq!(
                state.balance(DEPLOYER),
                U256::from(1_000_000_000_000_000_000u128 - 1000)
            );
            assert_eq!(state.nonce(DEPLOYER), 0);
            assert_eq!(state.dump().root, state.root());
        })
        .unwrap();
}

#[test]
fn test_unaffordable_value_is_reported_in_band() {
    let gateway = Gateway::from_config(&LabConfig::default()).unwrap();
    let mut request = call_request(RECIPIENT, Bytes::new());
    request.value = "1".to_string();

    let response = gateway.call(request).unwrap();
    assert!(!response.is_success());
    assert!(response.err_msg.starts_with("Error:"));
    gateway.inspect(|state| assert_eq!(state.balance(RECIPIENT), U256::ZERO)).unwrap();
}

#[test]
fn test_deploy_and_call_through_config() {
    let gateway = funded_gateway();
    let deployed = gateway.create(create_request(deploy_code(STORE_42_RUNTIME))).unwrap();
    let contract = deployed.addr.unwrap();

    let called = gateway.call(call_request(contract, Bytes::new())).unwrap();
    assert_eq!(U256::from_be_slice(&called.result), U256::from(42));

    let json = serde_json::to_value(&called).unwrap();
    assert!(json.get("addr").is_none());
    assert_eq!(json["errMsg"], "");
}

#[test]
fn test_stat_dump_attaches_stats() {
    let gateway = Gateway::from_config(&config(r#"{ "statDump": true }"#)).unwrap();
    let response = gateway.create(create_request(deploy_code(STORE_42_RUNTIME))).unwrap();
    let stats = response.stats.unwrap();
    assert_eq!(stats.samples, 1);
}

#[test]
fn test_concurrent_operations_are_rejected_not_queued() {
    const CALLERS: usize = 16;
    let gateway = Arc::new(funded_gateway());
    let barrier = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let gateway = gateway.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                gateway.create(create_request(deploy_code(STORE_42_RUNTIME)))
            })
        })
        .collect();

    let results: Vec<Result<OperationResponse, GatewayError>> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();
    let admitted = results.iter().filter(|r| r.is_ok()).count();
    let rejected = results.iter().filter(|r| matches!(r, Err(GatewayError::Rejected))).count();

    assert!(admitted >= 1);
    assert_eq!(admitted + rejected, CALLERS);
    // every admitted deploy bumped the nonce exactly once
    gateway.inspect(|state| assert_eq!(state.nonce(DEPLOYER), admitted as u64)).unwrap();
}
