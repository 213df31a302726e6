use async_trait::async_trait;
use std::time::Duration;

use crate::models::{BundlerError, Result};

/// A message ready for the ingestion queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
    pub destination: String,
}

/// Remote key/value store that knows where telemetry goes.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<String>;
}

/// Delivery of queue messages. Delivery guarantees belong to the implementation.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    async fn send_message(&self, message: QueueMessage) -> Result<()>;
}

/// Resolves parameters from a value fixed in configuration.
#[derive(Debug, Clone)]
pub struct StaticParameterStore {
    value: String,
}

impl StaticParameterStore {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

#[async_trait]
impl ParameterStore for StaticParameterStore {
    async fn get_parameter(&self, _name: &str) -> Result<String> {
        Ok(self.value.clone())
    }
}

/// Resolves `/bundler/metric/stdQueue` from `BUNDLER_METRIC_STDQUEUE`.
#[derive(Debug, Clone, Default)]
pub struct EnvParameterStore;

impl EnvParameterStore {
    pub fn variable_name(parameter: &str) -> String {
        parameter
            .trim_start_matches('/')
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

#[async_trait]
impl ParameterStore for EnvParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String> {
        let variable = Self::variable_name(name);
        match std::env::var(&variable) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(BundlerError::TelemetryError(format!(
                "Parameter {} not found (looked up {})",
                name, variable
            ))),
        }
    }
}

/// Posts each message body as JSON to the destination URL.
#[derive(Debug, Clone)]
pub struct HttpQueueTransport {
    http_client: reqwest::Client,
}

impl HttpQueueTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BundlerError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl QueueTransport for HttpQueueTransport {
    async fn send_message(&self, message: QueueMessage) -> Result<()> {
        self.http_client
            .post(&message.destination)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(message.body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_name() {
        assert_eq!(
            EnvParameterStore::variable_name("/bundler/metric/stdQueue"),
            "BUNDLER_METRIC_STDQUEUE"
        );
    }

    #[tokio::test]
    async fn test_env_store_missing_variable() {
        let store = EnvParameterStore;
        let result = store.get_parameter("/bundler/metric/unsetQueueForTests").await;
        assert!(matches!(result, Err(BundlerError::TelemetryError(_))));
    }

    #[tokio::test]
    async fn test_static_store() {
        let store = StaticParameterStore::new("https://queue.example/metrics");
        assert_eq!(
            store.get_parameter("/bundler/metric/stdQueue").await.unwrap(),
            "https://queue.example/metrics"
        );
    }
}
