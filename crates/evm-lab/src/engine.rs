//! Binding to the EVM.
//!
//! Operations run as message-level executions: the first frame receives the whole gas limit, no
//! intrinsic gas is charged, gas is not bought from the sender and the beneficiary is not paid.
//! A call leaves the sender nonce alone; a create bumps it from inside the create frame.

use alloy_primitives::{Address, Bytes, Log};
use revm::{
    context::{
        result::{EVMError, ExecResultAndState, ExecutionResult},
        Context,
    },
    handler::{EthFrame, Handler, MainnetHandler},
    inspector::InspectorHandler,
    interpreter::interpreter::EthInterpreter,
    state::EvmState,
    Database, ExecuteEvm, MainBuilder, MainContext,
};
use tracing::{debug, trace};

use crate::{ExecutionContext, ExecutionFailure, OperationKind, StateDb, Tracer, WorldState};

type EngineError = EVMError<<StateDb as Database>::Error>;

/// Handler driving one message-level execution. Validation, fee purchase and beneficiary reward
/// are transaction-level phases and never run.
fn message_handler<EVM>() -> MainnetHandler<EVM, EngineError, EthFrame<EthInterpreter>> {
    MainnetHandler::default()
}

/// What one engine run produced.
#[derive(Debug, Clone, Default)]
pub struct EngineOutcome {
    /// Return data, or the revert payload
    pub output: Bytes,
    /// Gas spent, refunds not deducted
    pub gas_used: u64,
    /// Gas left of the effective gas limit
    pub gas_left: u64,
    /// Address of the created contract. For creates this is known even when creation failed.
    pub created: Option<Address>,
    /// Logs emitted by a successful run
    pub logs: Vec<Log>,
    /// State changes of a successful run, not yet applied
    pub changes: EvmState,
    /// Why the run failed, `None` on success
    pub failure: Option<ExecutionFailure>,
}

impl EngineOutcome {
    /// Returns `true` if the run succeeded.
    pub const fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs `ctx` against `state` with `tracer` attached.
///
/// The world state is left unchanged. Changes are handed back in [`EngineOutcome::changes`] for the
/// caller to apply.
pub fn execute(state: &mut WorldState, ctx: &ExecutionContext, tracer: &mut Tracer) -> EngineOutcome {
    let nonce = state.nonce(ctx.origin);
    let predicted = (ctx.kind == OperationKind::Create).then(|| ctx.origin.create(nonce));
    let tx = ctx.tx_env(nonce);
    trace!(origin = %ctx.origin, nonce, gas_limit = ctx.gas_limit, ?predicted, "Executing");

    let evm_context = Context::mainnet()
        .with_db(state.db_mut())
        .with_cfg(ctx.cfg.clone())
        .with_block(ctx.block.clone())
        .with_tx(tx);

    let result = match tracer {
        Tracer::None => {
            let mut evm = evm_context.build_mainnet();
            let mut handler = message_handler();
            handler
                .load_accounts(&mut evm)
                .and_then(|()| handler.run_system_call(&mut evm))
                .map(|result| ExecResultAndState::new(result, evm.finalize()))
        }
        Tracer::Debug { inspector, .. } => {
            let mut evm = evm_context.build_mainnet_with_inspector(inspector.as_mut());
            let mut handler = message_handler();
            handler
                .load_accounts(&mut evm)
                .and_then(|()| handler.inspect_run_system_call(&mut evm))
                .map(|result| ExecResultAndState::new(result, evm.finalize()))
        }
        Tracer::Machine(inspector) => {
            let mut evm = evm_context.build_mainnet_with_inspector(inspector.as_mut());
            let mut handler = message_handler();
            handler
                .load_accounts(&mut evm)
                .and_then(|()| handler.inspect_run_system_call(&mut evm))
                .map(|result| ExecResultAndState::new(result, evm.finalize()))
        }
    };

    let result_and_state = match result {
        Ok(result_and_state) => result_and_state,
        Err(e) => {
            debug!(error = %e, "Execution aborted by the engine");
            return EngineOutcome {
                gas_left: ctx.gas_limit,
                created: predicted,
                failure: Some(ExecutionFailure::Invalid(e.to_string())),
                ..Default::default()
            };
        }
    };

    match result_and_state.result {
        ExecutionResult::Success { gas_used, gas_refunded, logs, output, .. } => {
            // refunds are only capped at transaction level, which message execution skips
            let spent = gas_used.saturating_add(gas_refunded);
            EngineOutcome {
                created: output.address().copied().or(predicted),
                output: output.into_data(),
                gas_used: spent,
                gas_left: ctx.gas_limit.saturating_sub(spent),
                logs,
                changes: result_and_state.state,
                failure: None,
            }
        }
        ExecutionResult::Revert { gas_used, output } => EngineOutcome {
            output,
            gas_used,
            gas_left: ctx.gas_limit.saturating_sub(gas_used),
            created: predicted,
            failure: Some(ExecutionFailure::Reverted),
            ..Default::default()
        },
        ExecutionResult::Halt { reason, gas_used } => EngineOutcome {
            gas_used,
            gas_left: ctx.gas_limit.saturating_sub(gas_used),
            created: predicted,
            failure: Some(ExecutionFailure::Halted(format!("{reason:?}"))),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{
            call_request, create_request, deploy_code, revert_runtime, DEPLOYER as SENDER,
            STORE_42_RUNTIME,
        },
        ChainEnv, ExecutionContextBuilder, OperationRequest, TraceMode,
    };
    use alloy_primitives::U256;

    fn context(request: impl Into<OperationRequest>) -> ExecutionContext {
        ExecutionContextBuilder::new(&ChainEnv::default()).build(&request.into()).unwrap()
    }

    fn create(code: Bytes) -> ExecutionContext {
        context(create_request(code))
    }

    fn call(receiver: Address) -> ExecutionContext {
        context(call_request(receiver, Bytes::new()))
    }

    #[test]
    fn test_create_reports_address_and_changes() {
        let mut state = WorldState::new();
        let outcome =
            execute(&mut state, &create(deploy_code(STORE_42_RUNTIME)), &mut Tracer::None);

        assert!(outcome.is_success(), "{:?}", outcome.failure);
        assert_eq!(outcome.created, Some(SENDER.create(0)));
        assert_eq!(outcome.output.as_ref(), STORE_42_RUNTIME);
        assert!(outcome.gas_used > 0);
        assert_eq!(outcome.gas_left, 1_000_000 - outcome.gas_used);

        // nothing reaches the world state until the changes are applied
        assert!(state.account(SENDER.create(0)).is_none());
        state.apply(outcome.changes);
        assert_eq!(state.code(SENDER.create(0)).as_ref(), STORE_42_RUNTIME);
        assert_eq!(state.nonce(SENDER), 1);
    }

    #[test]
    fn test_call_runs_deployed_code() {
        let mut state = WorldState::new();
        let outcome =
            execute(&mut state, &create(deploy_code(STORE_42_RUNTIME)), &mut Tracer::None);
        let contract = outcome.created.unwrap();
        state.apply(outcome.changes);

        let outcome = execute(&mut state, &call(contract), &mut Tracer::None);
        assert!(outcome.is_success());
        assert_eq!(U256::from_be_slice(&outcome.output), U256::from(42));
        state.apply(outcome.changes);
        assert_eq!(state.storage(contract, U256::ZERO), U256::from(42));
    }

    #[test]
    fn test_revert_keeps_payload_and_predicted_address() {
        let mut state = WorldState::new();
        let outcome = execute(
            &mut state,
            &create(revert_runtime(&[0xde, 0xad, 0xbe, 0xef])),
            &mut Tracer::None,
        );

        assert_eq!(outcome.failure, Some(ExecutionFailure::Reverted));
        assert_eq!(outcome.output.as_ref(), &[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(outcome.created, Some(SENDER.create(0)));
        assert!(outcome.changes.is_empty());
    }

    #[test]
    fn test_halt_is_reported() {
        let mut state = WorldState::new();
        // INVALID
        let outcome = execute(&mut state, &create(Bytes::from_static(&[0xfe])), &mut Tracer::None);
        assert!(matches!(outcome.failure, Some(ExecutionFailure::Halted(_))));
        assert_eq!(outcome.gas_left, 0);
    }

    #[test]
    fn test_debug_tracer_records_steps() {
        let mut state = WorldState::new();
        let mut tracer = TraceMode::Debug(Default::default()).tracer();
        let outcome = execute(&mut state, &create(deploy_code(STORE_42_RUNTIME)), &mut tracer);
        assert!(outcome.is_success());

        let rendered = tracer.render(outcome.gas_used, &outcome.output).unwrap();
        let trace: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert!(!trace["structLogs"].as_array().unwrap().is_empty());
    }
}
