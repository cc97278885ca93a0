//! Errors of the gateway.

use std::path::PathBuf;

/// Message returned to a caller that lost the race for the world state.
pub const CONCURRENCY_REJECTED: &str = "no concurrent allowed";

/// Errors raised while loading the service configuration. These are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("config file not found:{}", path.display())]
    FileRead {
        /// Path that was attempted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`LabConfig`](crate::LabConfig)
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        /// Path of the offending file
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The configured hardfork name is unknown to the engine
    #[error("unknown hardfork: {0}")]
    UnknownHardfork(String),

    /// The genesis allocation could not be loaded into the world state
    #[error("invalid genesis: {0}")]
    Genesis(String),
}

/// Malformed numeric fields in an inbound request. The engine is never invoked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Gas price is not a non-negative decimal integer
    #[error("invalid gas price:{0}")]
    GasPrice(String),

    /// Value is not a non-negative decimal integer
    #[error("invalid value:{0}")]
    Value(String),
}

/// Request-level failures. Neither touches the world state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Another operation holds the world state
    #[error("no concurrent allowed")]
    Rejected,

    /// The request could not be turned into an execution context
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure reported by the engine for an executed operation.
///
/// The engine has already rolled back its own effects when one of these is returned; the gateway
/// only has to refrain from committing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionFailure {
    /// Execution ended with `REVERT`
    #[error("execution reverted")]
    Reverted,

    /// Execution halted exceptionally (out of gas, invalid opcode, ...)
    #[error("execution halted: {0}")]
    Halted(String),

    /// The engine refused the transaction before executing it
    #[error("{0}")]
    Invalid(String),
}
