//! The request pipeline.
//!
//! Every operation walks `Admitted -> ContextBuilt -> Executing -> Committed | RevertDecoded ->
//! Responded`. Admission is released when the operation leaves the pipeline, whichever way it
//! leaves.

use tracing::{debug, info, warn};

use crate::{
    decode_revert_reason, engine, AdmissionGate, CallRequest, ChainEnv, ConfigError, CreateRequest,
    Diagnostics, EngineOutcome, ExecutionContext, ExecutionContextBuilder, GatewayError, LabConfig,
    MeasurementStrategy, OperationRequest, OperationResponse, RunStats, TraceMode, Tracer,
    WorldState,
};

/// Single-writer execution gateway in front of one world state.
#[derive(Debug)]
pub struct Gateway {
    state: AdmissionGate<WorldState>,
    chain: ChainEnv,
    trace_mode: TraceMode,
    measurement: MeasurementStrategy,
    diagnostics: Diagnostics,
}

impl Gateway {
    /// Creates a gateway over `state` that executes once, untraced, with no reports.
    pub fn new(state: WorldState, chain: ChainEnv) -> Self {
        Self {
            state: AdmissionGate::new(state),
            chain,
            trace_mode: TraceMode::None,
            measurement: MeasurementStrategy::Single,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Creates the gateway described by the service configuration.
    pub fn from_config(config: &LabConfig) -> Result<Self, ConfigError> {
        let state = match &config.genesis {
            Some(genesis) => WorldState::from_genesis(genesis)?,
            None => WorldState::new(),
        };
        let chain = ChainEnv::from_config(config)?;
        let gateway = Self::new(state, chain)
            .with_trace_mode(TraceMode::from_config(config))
            .with_measurement(MeasurementStrategy::from_config(config))
            .with_diagnostics(Diagnostics::from_config(config));
        info!(
            trace_mode = ?gateway.trace_mode,
            measurement = ?gateway.measurement,
            spec = ?gateway.chain.spec,
            "Gateway ready"
        );
        Ok(gateway)
    }

    /// Sets the trace mode.
    pub const fn with_trace_mode(mut self, trace_mode: TraceMode) -> Self {
        self.trace_mode = trace_mode;
        self
    }

    /// Sets the measurement strategy.
    pub const fn with_measurement(mut self, measurement: MeasurementStrategy) -> Self {
        self.measurement = measurement;
        self
    }

    /// Sets the post-execution reports.
    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Returns the chain environment.
    pub const fn chain(&self) -> &ChainEnv {
        &self.chain
    }

    /// Deploys a contract.
    pub fn create(&self, request: CreateRequest) -> Result<OperationResponse, GatewayError> {
        self.execute(request.into())
    }

    /// Calls a contract.
    pub fn call(&self, request: CallRequest) -> Result<OperationResponse, GatewayError> {
        self.execute(request.into())
    }

    /// Runs one operation through the pipeline.
    ///
    /// Returns [`GatewayError::Rejected`] without waiting if another operation is in flight.
    /// Engine failures are not errors: they are reported in-band and leave the world state
    /// untouched.
    pub fn execute(&self, request: OperationRequest) -> Result<OperationResponse, GatewayError> {
        self.execute_with(|| Ok::<_, GatewayError>(request))
    }

    /// Like [`Self::execute`], but the request is produced by `request` once admission is granted.
    ///
    /// A busy gateway turns the caller away before `request` runs, so a malformed request sent
    /// while another operation is in flight is rejected like any other.
    pub fn execute_with<E>(
        &self,
        request: impl FnOnce() -> Result<OperationRequest, E>,
    ) -> Result<OperationResponse, E>
    where
        E: From<GatewayError>,
    {
        let Some(mut state) = self.state.try_acquire() else {
            warn!("Rejected concurrent operation");
            return Err(GatewayError::Rejected.into());
        };
        let request = request()?;
        debug!(kind = ?request.kind(), sender = %request.sender(), "Admitted operation");

        let ctx = ExecutionContextBuilder::new(&self.chain)
            .build(&request)
            .inspect_err(|e| debug!(error = %e, "Invalid request"))
            .map_err(|e| E::from(GatewayError::from(e)))?;

        Ok(self.run(&mut state, &ctx))
    }

    /// Whether an operation is in flight. Cheap and lock-free, but only advisory: the answer may
    /// be stale, and [`Self::execute`] still decides admission on its own.
    pub fn is_busy(&self) -> bool {
        self.state.is_held()
    }

    /// Runs `f` against the world state, under the same admission rule as operations.
    pub fn inspect<R>(&self, f: impl FnOnce(&WorldState) -> R) -> Result<R, GatewayError> {
        let state = self.state.try_acquire().ok_or(GatewayError::Rejected)?;
        Ok(f(&state))
    }

    fn run(&self, state: &mut WorldState, ctx: &ExecutionContext) -> OperationResponse {
        let snapshot = self.measurement.is_isolated().then(|| state.clone());
        let mut pending = None;

        let ((outcome, tracer), stats) = self.measurement.measure(|watch| {
            // Preparing a sample is not timed: either rewind or carry the previous sample forward.
            let previous = pending.take();
            match &snapshot {
                Some(snapshot) => state.clone_from(snapshot),
                None => {
                    if let Some(changes) = previous {
                        state.apply(changes);
                    }
                }
            }

            let mut tracer = self.trace_mode.tracer();
            let mut outcome = watch.time(|| engine::execute(state, ctx, &mut tracer));
            if outcome.is_success() {
                pending = Some(std::mem::take(&mut outcome.changes));
            }
            (outcome, tracer)
        });

        let gas_used = ctx.gas_limit.saturating_sub(outcome.gas_left);
        let mut response = OperationResponse {
            addr: outcome.created,
            result: outcome.output.clone(),
            err_msg: String::new(),
            gas_used,
            stats: self.reports_stats().then_some(stats),
        };

        match &outcome.failure {
            Some(failure) => {
                response.err_msg = decode_revert_reason(failure, &outcome.output);
                if self.measurement.is_benchmark() && !self.measurement.is_isolated() {
                    // Earlier samples may have succeeded and built on the state.
                    state.commit();
                }
                info!(kind = ?ctx.kind, origin = %ctx.origin, gas_used, error = %failure, "Operation failed");
                if self.prints_output() {
                    self.diagnostics.print_failure(&outcome.output, &response.err_msg);
                }
            }
            None => {
                if let Some(changes) = pending {
                    state.apply(changes);
                }
                let root = state.commit();
                info!(kind = ?ctx.kind, origin = %ctx.origin, gas_used, %root, "Operation committed");
                self.report(state, &tracer, &outcome, gas_used, &stats);
            }
        }

        response
    }

    fn reports_stats(&self) -> bool {
        self.measurement.is_benchmark() || self.diagnostics.stat_dump
    }

    fn report(
        &self,
        state: &WorldState,
        tracer: &Tracer,
        outcome: &EngineOutcome,
        gas_used: u64,
        stats: &RunStats,
    ) {
        if self.diagnostics.dump {
            self.diagnostics.dump_state(state);
        }
        if let Some(trace) = tracer.render(outcome.gas_used, &outcome.output) {
            self.diagnostics.write_trace(&trace, &outcome.logs);
        }
        if self.reports_stats() {
            self.diagnostics.print_stats(gas_used, stats);
        }
        if self.prints_output() {
            self.diagnostics.print_return_data(&outcome.output);
        }
    }

    fn prints_output(&self) -> bool {
        self.diagnostics.print_output && matches!(self.trace_mode, TraceMode::None)
    }
}
