//! Human-readable diagnostics for failed executions.

use alloy_primitives::hex;
use alloy_sol_types::{sol_data, Panic, SolError, SolType};

/// Formats a failed execution for humans.
///
/// Output looks like `Error:<err> Method:0x<selector> Msg:'<reason>' Raw:0x<payload>`. The reason
/// is decoded from `Error(string)` and `Panic(uint256)` payloads; anything else yields the decode
/// error in its place. Never fails, whatever the payload.
pub fn decode_revert_reason(error: &impl std::fmt::Display, output: &[u8]) -> String {
    let Some((selector, params)) = output.split_at_checked(4) else {
        return format!(
            "Error:{error} Method:0x Msg:'revert data too short: {} bytes' Raw:0x{}",
            output.len(),
            hex::encode(output)
        );
    };

    let message = if selector == Panic::SELECTOR {
        match Panic::abi_decode(output) {
            Ok(panic) => match panic.kind() {
                Some(kind) => format!("panic: {kind}"),
                None => format!("panic: code 0x{:x}", panic.code),
            },
            Err(e) => e.to_string(),
        }
    } else {
        match <(sol_data::String,) as SolType>::abi_decode_params(params) {
            Ok((reason,)) => reason,
            Err(e) => e.to_string(),
        }
    };

    format!(
        "Error:{error} Method:0x{} Msg:'{message}' Raw:0x{}",
        hex::encode(selector),
        hex::encode(output)
    )
}
