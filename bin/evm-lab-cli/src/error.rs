use alloy_primitives::hex::FromHexError;
use evm_lab::{ConfigError, ValidationError};

/// Error types of the `evm-lab` tool
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Startup configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Request field rejected before sending
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid hex string
    #[error("Invalid hex string: {0}")]
    InvalidHex(#[from] FromHexError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// ABI file could not be parsed
    #[error("Invalid ABI file: {0}")]
    AbiFile(serde_json::Error),

    /// Arguments could not be packed
    #[error("abi.Pack err:{0}")]
    AbiPack(#[from] alloy_dyn_abi::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("API err:{0}")]
    Http(#[from] reqwest::Error),

    /// The server refused the request
    #[error("server responded {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message of the server
        message: String,
    },

    /// Logging could not be initialized
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type of the `evm-lab` tool
pub type Result<T, E = Error> = std::result::Result<T, E>;
