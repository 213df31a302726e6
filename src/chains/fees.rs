use ethers::{types::U256, utils::parse_units};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::chains::gas_station::{gwei_ceil_to_wei, GasStation};
use crate::chains::rpc::FeeProvider;
use crate::models::{BundlerError, FeeEstimate, Result};

pub const POLYGON_CHAIN_ID: u64 = 137;
pub const DEFAULT_ORACLE_FEE_GWEI: u64 = 40;

/// Fee resolution policy for chains whose native estimator is unreliable.
#[derive(Debug, Clone)]
pub struct FeeResolverConfig {
    pub oracle_chain_id: u64,
    pub default_fee_gwei: u64,
}

impl Default for FeeResolverConfig {
    fn default() -> Self {
        Self {
            oracle_chain_id: POLYGON_CHAIN_ID,
            default_fee_gwei: DEFAULT_ORACLE_FEE_GWEI,
        }
    }
}

/// Produces a fresh fee estimate per call; prices are never cached.
pub struct ChainFeeResolver {
    gas_station: Arc<dyn GasStation>,
    config: FeeResolverConfig,
}

impl ChainFeeResolver {
    pub fn new(gas_station: Arc<dyn GasStation>, config: FeeResolverConfig) -> Self {
        Self { gas_station, config }
    }

    /// Fixed estimate used on the oracle chain when the oracle is unavailable.
    pub fn fallback_estimate(&self) -> Result<FeeEstimate> {
        let fee: U256 = parse_units(self.config.default_fee_gwei, "gwei")
            .map_err(|e| BundlerError::ConfigError(format!("Invalid default fee: {}", e)))?
            .into();
        Ok(FeeEstimate::dynamic(fee, fee))
    }

    pub async fn resolve_fees(&self, provider: &dyn FeeProvider) -> Result<FeeEstimate> {
        let chain_id = match provider.chain_id().await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to read chain ID, using native fee estimation: {}", e);
                None
            }
        };

        if chain_id == Some(self.config.oracle_chain_id) {
            return self.resolve_from_oracle().await;
        }

        provider.fee_data().await
    }

    async fn resolve_from_oracle(&self) -> Result<FeeEstimate> {
        match self.query_oracle().await {
            Ok(fees) => {
                debug!(
                    "Gas station fees for chain {}: max fee {:?}, priority {:?}",
                    self.config.oracle_chain_id, fees.max_fee_per_gas, fees.max_priority_fee_per_gas
                );
                Ok(fees)
            }
            Err(e) => {
                warn!(
                    "Gas station unavailable for chain {}, using {} gwei default: {}",
                    self.config.oracle_chain_id, self.config.default_fee_gwei, e
                );
                self.fallback_estimate()
            }
        }
    }

    async fn query_oracle(&self) -> Result<FeeEstimate> {
        let tier = self.gas_station.fast_tier().await?;
        let max_fee = gwei_ceil_to_wei(tier.max_fee)?;
        let max_priority_fee = gwei_ceil_to_wei(tier.max_priority_fee)?;
        Ok(FeeEstimate::dynamic(max_fee, max_priority_fee))
    }
}
