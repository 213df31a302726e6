pub mod models;
pub mod config;
pub mod chains;
pub mod telemetry;
pub mod context;

pub use models::{BundlerError, FeeEstimate, MetricRecord, Result};
pub use crate::config::Settings;
pub use context::ResilienceContext;

// Re-export commonly used types
pub use ethers::types::U256;
