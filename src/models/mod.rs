pub mod error;
pub mod fees;
pub mod metric;
pub mod rpc_codes;

pub use error::*;
pub use fees::*;
pub use metric::*;
