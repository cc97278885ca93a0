//! Logging configuration of the `evm-lab` tool.
//!
//! Verbosity comes from `-v` flags and from the `verbosity` config key, whichever is larger.
//! `RUST_LOG` overrides both. `--log.file` redirects logs to a file.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{Error, Result};

/// Logging configuration arguments.
#[derive(Debug, Clone, Default, Parser)]
pub struct LogArgs {
    /// Increase logging verbosity (-v = error, -vv = warn, -vvv = info, -vvvv = debug, -vvvvv =
    /// trace)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file path. If specified, logs are written to this file instead of stderr.
    #[arg(long = "log.file", visible_aliases = ["log-file"], global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colorful console logging. Only applies when logging to stderr (no --log.file).
    #[arg(long = "log.no-color", visible_aliases = ["log-no-color"], global = true)]
    pub log_no_color: bool,
}

impl LogArgs {
    /// Initializes the tracing subscriber. `config_verbosity` is the `verbosity` config key.
    ///
    /// Log target is only shown for DEBUG level and above.
    pub fn init(&self, config_verbosity: u8) -> Result<()> {
        let verbosity = self.verbose.max(config_verbosity);
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(verbosity))
        };
        let show_target = verbosity >= 4;

        let result = if let Some(ref log_file) = self.log_file {
            let file = std::fs::File::create(log_file)?;
            fmt()
                .with_env_filter(filter)
                .with_target(show_target)
                .with_writer(file)
                .with_ansi(false)
                .try_init()
        } else {
            fmt()
                .with_env_filter(filter)
                .with_target(show_target)
                .with_writer(std::io::stderr)
                .with_ansi(!self.log_no_color)
                .try_init()
        };
        result.map_err(|e| Error::Logging(e.to_string()))
    }
}

/// Returns the filter directives for a verbosity level. 0 turns logging off.
pub fn filter_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => return "off".to_string(),
        1 => Level::ERROR,
        2 => Level::WARN,
        3 => Level::INFO,
        4 => Level::DEBUG,
        _ => Level::TRACE,
    };
    format!("evm_lab={level},evm_lab_cli={level}")
}
