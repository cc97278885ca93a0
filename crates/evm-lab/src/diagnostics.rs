//! Post-execution reports: state dumps, debug traces, emitted logs and run statistics.
//!
//! Reports are best effort. A failing write is logged and never affects the response.

use std::path::{Path, PathBuf};

use alloy_primitives::{hex, Bytes, Log};
use tracing::warn;

use crate::{LabConfig, RunStats, WorldState};

/// Which reports follow a successful operation, and where they go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Dump the world state
    pub dump: bool,
    /// Print run statistics
    pub stat_dump: bool,
    /// Print the return data when no tracer is active
    pub print_output: bool,
    /// File receiving debug traces, stderr when `None`
    pub trace_output: Option<PathBuf>,
    /// File receiving state dumps, stdout when `None`
    pub dump_output: Option<PathBuf>,
}

impl Diagnostics {
    /// Reads the diagnostics keys of the configuration.
    pub fn from_config(config: &LabConfig) -> Self {
        Self {
            dump: config.dump,
            stat_dump: config.stat_dump,
            print_output: !config.machine && !config.debug,
            trace_output: config.trace_output.clone(),
            dump_output: config.dump_output.clone(),
        }
    }

    /// Dumps the world state as pretty JSON.
    pub fn dump_state(&self, state: &WorldState) {
        let json = match serde_json::to_string_pretty(&state.dump()) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Failed to serialize state dump");
                return;
            }
        };

        match &self.dump_output {
            Some(path) => write_file(path, &json, "state dump"),
            None => {
                println!();
                println!("=== State Dump ===");
                println!("{json}");
            }
        }
    }

    /// Writes a rendered debug trace followed by the logs emitted by the operation.
    pub fn write_trace(&self, trace: &str, logs: &[Log]) {
        let mut report = String::from(trace);
        report.push('\n');
        report.push_str(&format_logs(logs));

        match &self.trace_output {
            Some(path) => write_file(path, &report, "trace"),
            None => {
                eprintln!();
                eprintln!("=== Execution Trace ===");
                eprint!("{report}");
            }
        }
    }

    /// Prints gas and run statistics.
    pub fn print_stats(&self, gas_used: u64, stats: &RunStats) {
        eprintln!();
        eprintln!("=== Execution Statistics ===");
        eprintln!("EVM gas used:     {gas_used}");
        eprintln!("Execution time:   {:?}", stats.duration());
        eprintln!("Allocations:      {}", stats.allocs);
        eprintln!("Allocated bytes:  {}", stats.allocated_bytes);
        if stats.samples > 1 {
            eprintln!("Samples:          {}", stats.samples);
        }
    }

    /// Prints the return data as hex.
    pub fn print_return_data(&self, output: &Bytes) {
        println!("0x{}", hex::encode(output));
    }

    /// Prints the return data and the decoded failure.
    pub fn print_failure(&self, output: &Bytes, err_msg: &str) {
        println!("0x{}", hex::encode(output));
        println!("error: {err_msg}");
    }
}

/// Formats emitted logs, one block per log.
pub fn format_logs(logs: &[Log]) -> String {
    let mut out = String::from("=== Logs ===\n");
    if logs.is_empty() {
        out.push_str("(none)\n");
    }
    for (index, log) in logs.iter().enumerate() {
        out.push_str(&format!("#{index} address: {}\n", log.address));
        for (i, topic) in log.topics().iter().enumerate() {
            out.push_str(&format!("   topic{i}: {topic}\n"));
        }
        out.push_str(&format!("   data: 0x{}\n", hex::encode(&log.data.data)));
    }
    out
}

fn write_file(path: &Path, content: &str, what: &str) {
    match std::fs::write(path, content) {
        Ok(()) => eprintln!("{what} written to: {}", path.display()),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to write {what}"),
    }
}
