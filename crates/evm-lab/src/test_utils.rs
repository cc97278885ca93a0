//! Bytecode and request helpers for tests.

use alloy_primitives::{address, Address, Bytes};
use revm::bytecode::opcode::{CODECOPY, MSTORE, PUSH1, RETURN, REVERT, SSTORE};

use crate::{CallRequest, CreateRequest};

/// Default sender of test requests.
pub const DEPLOYER: Address = address!("00000000000000000000000000000000000000aa");

/// Gas limit of test requests.
pub const TEST_GAS: u64 = 1_000_000;

/// Runtime code that stores 42 in slot 0 and returns 42 as a word.
pub const STORE_42_RUNTIME: &[u8] = &[
    PUSH1, 0x2a, PUSH1, 0x00, SSTORE, // slot 0 = 42
    PUSH1, 0x2a, PUSH1, 0x00, MSTORE, // mem[0..32] = 42
    PUSH1, 0x20, PUSH1, 0x00, RETURN,
];

/// Runtime code that returns 42 as a word and touches no state. Costs 18 gas per call.
pub const RETURN_42_RUNTIME: &[u8] = &[
    PUSH1, 0x2a, PUSH1, 0x00, MSTORE, // mem[0..32] = 42
    PUSH1, 0x20, PUSH1, 0x00, RETURN,
];

/// Code that copies `payload` from its own tail into memory and ends with `exit`.
fn copy_tail_and_exit(payload: &[u8], exit: u8) -> Bytes {
    let len = u8::try_from(payload.len()).expect("payload fits in PUSH1");
    // the prefix below is 12 bytes long
    let mut code = vec![PUSH1, len, PUSH1, 0x0c, PUSH1, 0x00, CODECOPY, PUSH1, len, PUSH1, 0x00, exit];
    code.extend_from_slice(payload);
    code.into()
}

/// Init code that deploys `runtime` unchanged.
pub fn deploy_code(runtime: &[u8]) -> Bytes {
    copy_tail_and_exit(runtime, RETURN)
}

/// Code that reverts with `payload`. Works both as init code and as runtime code.
pub fn revert_runtime(payload: &[u8]) -> Bytes {
    copy_tail_and_exit(payload, REVERT)
}

/// Create request from [`DEPLOYER`] with zero price and value.
pub fn create_request(code: Bytes) -> CreateRequest {
    CreateRequest {
        sender: DEPLOYER,
        code_and_input: code,
        gas: TEST_GAS,
        gas_price: "0".to_string(),
        value: "0".to_string(),
    }
}

/// Call request from [`DEPLOYER`] with zero price and value.
pub fn call_request(receiver: Address, input: Bytes) -> CallRequest {
    CallRequest {
        sender: DEPLOYER,
        receiver,
        input,
        gas: TEST_GAS,
        gas_price: "0".to_string(),
        value: "0".to_string(),
    }
}
