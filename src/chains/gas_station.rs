use async_trait::async_trait;
use ethers::{types::U256, utils::parse_units};
use serde::Deserialize;
use std::time::Duration;

use crate::models::{BundlerError, Result};

pub const POLYGON_GAS_STATION_URL: &str = "https://gasstation.polygon.technology/v2";

/// One speed tier of a gas station answer, in gwei.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasStationTier {
    pub max_fee: f64,
    pub max_priority_fee: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasStationResponse {
    pub safe_low: Option<GasStationTier>,
    pub standard: Option<GasStationTier>,
    pub fast: GasStationTier,
    pub estimated_base_fee: Option<f64>,
}

/// A third-party gas price oracle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GasStation: Send + Sync {
    async fn fast_tier(&self) -> Result<GasStationTier>;
}

/// Polygon PoS gas station v2.
pub struct PolygonGasStation {
    http_client: reqwest::Client,
    url: String,
}

impl PolygonGasStation {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BundlerError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl GasStation for PolygonGasStation {
    async fn fast_tier(&self) -> Result<GasStationTier> {
        let response: GasStationResponse = self.http_client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.fast)
    }
}

/// Round a gwei figure up to a whole gwei and convert it to wei.
///
/// Rounding down would underprice the operation and risk rejection.
pub fn gwei_ceil_to_wei(gwei: f64) -> Result<U256> {
    if !gwei.is_finite() || gwei < 0.0 {
        return Err(BundlerError::OracleError(format!("Invalid gwei amount: {}", gwei)));
    }

    let ceiled = gwei.ceil();
    if ceiled >= u64::MAX as f64 {
        return Err(BundlerError::OracleError(format!("Gwei amount out of range: {}", gwei)));
    }

    let whole = ceiled as u64;
    let wei = parse_units(whole, "gwei")
        .map_err(|e| BundlerError::OracleError(format!("Failed to scale {} gwei: {}", whole, e)))?;
    Ok(wei.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const GWEI: u64 = 1_000_000_000;

    #[test]
    fn test_gwei_rounds_up() {
        assert_eq!(gwei_ceil_to_wei(30.2).unwrap(), U256::from(31 * GWEI));
        assert_eq!(gwei_ceil_to_wei(30.0).unwrap(), U256::from(30 * GWEI));
        assert_eq!(gwei_ceil_to_wei(0.000_1).unwrap(), U256::from(GWEI));
    }

    #[test]
    fn test_gwei_rejects_garbage() {
        assert!(gwei_ceil_to_wei(f64::NAN).is_err());
        assert!(gwei_ceil_to_wei(-1.0).is_err());
        assert!(gwei_ceil_to_wei(1e20).is_err());
        assert!(gwei_ceil_to_wei(f64::INFINITY).is_err());
    }

    #[test]
    fn test_parse_gas_station_body() {
        let body = r#"{
            "safeLow": { "maxPriorityFee": 30.0, "maxFee": 30.6 },
            "standard": { "maxPriorityFee": 31.5, "maxFee": 32.1 },
            "fast": { "maxPriorityFee": 35.28, "maxFee": 35.88 },
            "estimatedBaseFee": 0.59,
            "blockTime": 2,
            "blockNumber": 52341234
        }"#;

        let response: GasStationResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.fast.max_fee, 35.88);
        assert_eq!(response.fast.max_priority_fee, 35.28);
        assert_eq!(response.estimated_base_fee, Some(0.59));
    }
}
