pub mod capability;
pub mod fees;
pub mod gas_station;
pub mod resilience;
pub mod rpc;

pub use capability::{CapabilityCache, ProbeOutcome, probe_method};
pub use fees::{ChainFeeResolver, FeeResolverConfig};
pub use gas_station::{GasStation, GasStationTier, PolygonGasStation};
pub use resilience::{ensure, sleep, wait_for, PollConfig};
pub use rpc::{FeeProvider, HttpRpcClient, RpcFault, RpcSend};
