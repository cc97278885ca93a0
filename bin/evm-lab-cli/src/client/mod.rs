mod abi;
pub use abi::*;

mod cmd;
pub use cmd::*;

mod http;
pub use http::*;
