//! Service configuration.
//!
//! The configuration is a single JSON document shared by the server and the client commands. Every
//! key is optional; a missing or malformed file is fatal at startup.

use std::path::{Path, PathBuf};

use alloy_genesis::Genesis;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ConfigError;

/// Config file used when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Port the HTTP server listens on when the config does not name one.
pub const DEFAULT_PORT: u16 = 8080;

/// Target wall time of one adaptive benchmark round.
pub const DEFAULT_BENCH_TIME_MS: u64 = 1_000;

/// Configuration of an evm-lab service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LabConfig {
    /// Port of the HTTP server
    pub port: u16,
    /// Initial chain state and block parameters. `None` starts from an empty state with every
    /// protocol change active.
    pub genesis: Option<Genesis>,
    /// Hardfork name overriding the one derived from the genesis chain config, e.g. `Cancun`
    pub hardfork: Option<String>,
    /// Log verbosity, 0 (off) to 5 (trace)
    pub verbosity: u8,

    /// Do not capture memory in traces
    pub disable_memory: bool,
    /// Do not capture the stack in traces
    pub disable_stack: bool,
    /// Do not capture storage in traces
    pub disable_storage: bool,
    /// Do not capture return data in traces
    pub disable_return_data: bool,

    /// Stream an EIP-3155 record per step to stdout
    pub machine: bool,
    /// Capture a structured trace and print it with the emitted logs after execution
    pub debug: bool,
    /// Dump the whole world state after every successful operation
    pub dump: bool,
    /// Print gas, timing and allocation statistics after every successful operation
    pub stat_dump: bool,

    /// Repeat every execution and report per-sample averages
    pub bench: bool,
    /// Fixed number of benchmark samples. Adaptive when absent.
    pub bench_samples: Option<u64>,
    /// Wall time an adaptive benchmark round has to reach, in milliseconds
    pub bench_time_ms: u64,
    /// Restore the pre-operation world state before every benchmark sample
    pub bench_isolated: bool,

    /// File receiving debug traces instead of stderr
    pub trace_output: Option<PathBuf>,
    /// File receiving state dumps instead of stdout
    pub dump_output: Option<PathBuf>,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            genesis: None,
            hardfork: None,
            verbosity: 0,
            disable_memory: false,
            disable_stack: false,
            disable_storage: false,
            disable_return_data: false,
            machine: false,
            debug: false,
            dump: false,
            stat_dump: false,
            bench: false,
            bench_samples: None,
            bench_time_ms: DEFAULT_BENCH_TIME_MS,
            bench_isolated: false,
            trace_output: None,
            dump_output: None,
        }
    }
}

impl LabConfig {
    /// Reads and parses the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::FileRead { path: path.to_path_buf(), source })?;
        serde_json::from_str(&content)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }
}
