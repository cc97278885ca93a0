//! Trace modes and the tracers backing them.

use alloy_primitives::Bytes;
use alloy_rpc_types_trace::geth::GethDefaultTracingOptions;
use revm::inspector::inspectors::TracerEip3155;
use revm_inspectors::tracing::{TracingInspector, TracingInspectorConfig};

use crate::LabConfig;

/// What a trace captures per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceFlags {
    /// Capture memory
    pub memory: bool,
    /// Capture the stack
    pub stack: bool,
    /// Capture storage
    pub storage: bool,
    /// Capture return data
    pub return_data: bool,
}

impl Default for TraceFlags {
    fn default() -> Self {
        Self { memory: true, stack: true, storage: true, return_data: true }
    }
}

impl TraceFlags {
    /// Reads the `disable*` keys of the configuration.
    pub const fn from_config(config: &LabConfig) -> Self {
        Self {
            memory: !config.disable_memory,
            stack: !config.disable_stack,
            storage: !config.disable_storage,
            return_data: !config.disable_return_data,
        }
    }

    /// Returns the matching options of the geth default tracer.
    pub fn geth_options(&self) -> GethDefaultTracingOptions {
        GethDefaultTracingOptions {
            disable_storage: Some(!self.storage),
            disable_memory: Some(!self.memory),
            enable_memory: Some(self.memory),
            disable_stack: Some(!self.stack),
            enable_return_data: Some(self.return_data),
            ..Default::default()
        }
    }

    /// Returns the recording config of a debug inspector capturing only what the flags select.
    pub fn inspector_config(&self) -> TracingInspectorConfig {
        let mut config = TracingInspectorConfig::from_geth_config(&self.geth_options());
        config.record_returndata_snapshots = self.return_data;
        config
    }
}

/// Which tracer observes executions. Chosen once at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TraceMode {
    /// No tracing
    #[default]
    None,
    /// Structured trace, printed with the emitted logs after a successful execution
    Debug(TraceFlags),
    /// One EIP-3155 JSON line per step on stdout
    Machine(TraceFlags),
}

impl TraceMode {
    /// Selects the mode described by the configuration. `machine` wins over `debug`.
    pub const fn from_config(config: &LabConfig) -> Self {
        let flags = TraceFlags::from_config(config);
        if config.machine {
            Self::Machine(flags)
        } else if config.debug {
            Self::Debug(flags)
        } else {
            Self::None
        }
    }

    /// Creates a fresh tracer for one execution.
    pub fn tracer(&self) -> Tracer {
        match self {
            Self::None => Tracer::None,
            Self::Debug(flags) => Tracer::Debug {
                inspector: Box::new(TracingInspector::new(flags.inspector_config())),
                flags: *flags,
            },
            Self::Machine(flags) => {
                let tracer = TracerEip3155::new(Box::new(std::io::stdout()));
                let tracer = if flags.memory { tracer.with_memory() } else { tracer };
                Tracer::Machine(Box::new(tracer))
            }
        }
    }
}

/// Tracer attached to one execution.
pub enum Tracer {
    /// Nothing attached
    None,
    /// Records a structured trace
    Debug {
        /// Call and step recorder
        inspector: Box<TracingInspector>,
        /// What to keep when rendering
        flags: TraceFlags,
    },
    /// Streams EIP-3155 lines to stdout
    Machine(Box<TracerEip3155>),
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("Tracer::None"),
            Self::Debug { flags, .. } => f.debug_struct("Tracer::Debug").field("flags", flags).finish(),
            Self::Machine(_) => f.write_str("Tracer::Machine"),
        }
    }
}

impl Tracer {
    /// Renders the recorded trace as geth-style JSON. Only debug tracers record anything.
    pub fn render(&self, gas_used: u64, output: &Bytes) -> Option<String> {
        let Self::Debug { inspector, flags } = self else {
            return None;
        };
        let frame =
            inspector.geth_builder().geth_traces(gas_used, output.clone(), flags.geth_options());
        Some(
            serde_json::to_string_pretty(&frame)
                .unwrap_or_else(|e| format!("Error serializing trace: {e}")),
        )
    }
}
