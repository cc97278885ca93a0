//! Command line tooling for the evm-lab execution gateway: the HTTP server, the request client and
//! the logging setup they share.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cmd;
pub use cmd::*;

mod error;
pub use error::*;

mod hex;
pub use hex::*;

mod logging;
pub use logging::*;

/// Client commands
pub mod client;

/// HTTP server
pub mod server;
