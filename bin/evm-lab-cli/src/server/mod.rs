mod cmd;
pub use cmd::*;

mod router;
pub use router::*;
