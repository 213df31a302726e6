use serde::{Deserialize, Serialize};
use config::{Config, ConfigError, File};
use std::path::Path;
use std::time::Duration;

use crate::chains::{FeeResolverConfig, PollConfig};
use crate::chains::fees::{DEFAULT_ORACLE_FEE_GWEI, POLYGON_CHAIN_ID};
use crate::chains::gas_station::POLYGON_GAS_STATION_URL;
use crate::telemetry::DEFAULT_QUEUE_PARAMETER;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub app: AppSettings,
    pub rpc: RpcSettings,
    pub fees: FeeSettings,
    pub metrics: MetricSettings,
    pub poll: PollSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub version: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcSettings {
    pub url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSettings {
    pub oracle_chain_id: u64,
    pub gas_station_url: String,
    pub default_fee_gwei: u64,
    pub oracle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSettings {
    /// Parameter-store name holding the queue URL.
    pub queue_parameter: String,
    /// Skips the parameter store when set.
    pub queue_url: Option<String>,
    pub publish_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSettings {
    pub timeout_ms: u64,
    pub interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppSettings {
                name: "Bundler Resilience".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                log_level: "info".to_string(),
            },
            rpc: RpcSettings {
                url: "http://localhost:8545".to_string(),
                timeout_seconds: 30,
            },
            fees: FeeSettings {
                oracle_chain_id: POLYGON_CHAIN_ID,
                gas_station_url: POLYGON_GAS_STATION_URL.to_string(),
                default_fee_gwei: DEFAULT_ORACLE_FEE_GWEI,
                oracle_timeout_seconds: 10,
            },
            metrics: MetricSettings {
                queue_parameter: DEFAULT_QUEUE_PARAMETER.to_string(),
                queue_url: None,
                publish_timeout_seconds: 10,
            },
            poll: PollSettings {
                timeout_ms: 10_000,
                interval_ms: 500,
            },
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("BUNDLER_RESILIENCE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(path.as_ref()))
            .build()?;

        s.try_deserialize()
    }

    /// Falls back to the defaults, keeping the load error for the caller to report.
    pub fn or_default(loaded: Result<Self, ConfigError>) -> (Self, Option<ConfigError>) {
        match loaded {
            Ok(settings) => (settings, None),
            Err(e) => (Settings::default(), Some(e)),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            timeout: Duration::from_millis(self.poll.timeout_ms),
            interval: Duration::from_millis(self.poll.interval_ms),
        }
    }

    pub fn fee_resolver_config(&self) -> FeeResolverConfig {
        FeeResolverConfig {
            oracle_chain_id: self.fees.oracle_chain_id,
            default_fee_gwei: self.fees.default_fee_gwei,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, url) in [("rpc.url", &self.rpc.url), ("fees.gas_station_url", &self.fees.gas_station_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("{} must be an http(s) URL, got {}", name, url));
            }
        }

        if self.poll.interval_ms == 0 {
            return Err("Poll interval must be greater than zero".to_string());
        }

        if self.metrics.queue_parameter.trim().is_empty() {
            return Err("Metric queue parameter name must not be empty".to_string());
        }

        if self.rpc.timeout_seconds == 0 || self.fees.oracle_timeout_seconds == 0 {
            return Err("Timeouts must be greater than zero".to_string());
        }

        Ok(())
    }
}
