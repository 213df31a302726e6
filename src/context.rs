use std::sync::Arc;
use std::time::Duration;

use crate::chains::{CapabilityCache, ChainFeeResolver, PolygonGasStation, PollConfig};
use crate::config::Settings;
use crate::models::Result;
use crate::telemetry::{
    EnvParameterStore, HttpQueueTransport, MetricPublisher, ParameterStore, QueueTransport,
    StaticParameterStore,
};

/// Owner of the state that lives for the whole process: the capability
/// cache, the fee resolver, and the metric publisher with its lazily
/// resolved queue.
pub struct ResilienceContext {
    pub capabilities: CapabilityCache,
    pub fees: ChainFeeResolver,
    pub metrics: MetricPublisher,
    pub poll: PollConfig,
}

impl ResilienceContext {
    pub fn new(
        fees: ChainFeeResolver,
        metrics: MetricPublisher,
        poll: PollConfig,
    ) -> Self {
        Self {
            capabilities: CapabilityCache::new(),
            fees,
            metrics,
            poll,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let gas_station = PolygonGasStation::new(
            settings.fees.gas_station_url.clone(),
            Duration::from_secs(settings.fees.oracle_timeout_seconds),
        )?;
        let fees = ChainFeeResolver::new(Arc::new(gas_station), settings.fee_resolver_config());

        let parameter_store: Arc<dyn ParameterStore> = match &settings.metrics.queue_url {
            Some(url) => Arc::new(StaticParameterStore::new(url.clone())),
            None => Arc::new(EnvParameterStore),
        };
        let publish_timeout = Duration::from_secs(settings.metrics.publish_timeout_seconds);
        let metrics = MetricPublisher::new(
            parameter_store,
            settings.metrics.queue_parameter.clone(),
            Box::new(move || -> Result<Arc<dyn QueueTransport>> {
                Ok(Arc::new(HttpQueueTransport::new(publish_timeout)?))
            }),
        );

        Ok(Self::new(fees, metrics, settings.poll_config()))
    }
}
