use std::path::PathBuf;

use clap::{Parser, Subcommand};
use evm_lab::{LabConfig, DEFAULT_CONFIG_FILE};

use crate::{LogArgs, Result};

/// Main command of the `evm-lab` tool
#[derive(Parser, Debug)]
#[command(name = "evm-lab", infer_subcommands = true, version = "0.1")]
pub struct MainCmd {
    /// Configuration file shared by the server and the client
    #[arg(long = "cfg", default_value = DEFAULT_CONFIG_FILE, global = true)]
    pub cfg: PathBuf,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands of the `evm-lab` tool
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Server actions
    #[command(subcommand)]
    Server(crate::server::Cmd),
    /// Client actions
    #[command(subcommand)]
    Client(crate::client::Cmd),
}

impl MainCmd {
    /// Loads the configuration, sets up logging and runs the subcommand.
    pub async fn run(&self) -> Result<()> {
        let config = LabConfig::load(&self.cfg)?;
        self.log_args.init(config.verbosity)?;

        match &self.command {
            Command::Server(cmd) => cmd.run(config).await,
            Command::Client(cmd) => cmd.run(config).await,
        }
    }
}
