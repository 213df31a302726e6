use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::{MetricRecord, Result};
use crate::telemetry::transport::{ParameterStore, QueueMessage, QueueTransport};

pub const DEFAULT_QUEUE_PARAMETER: &str = "/bundler/metric/stdQueue";

pub type TransportFactory = Box<dyn Fn() -> Result<Arc<dyn QueueTransport>> + Send + Sync>;

/// Destination of telemetry messages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueueEndpoint {
    #[default]
    Unresolved,
    Resolved(String),
}

/// What became of a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Delivered,
    /// No queue endpoint yet; the record was dropped.
    Unresolved,
    TransportUnavailable,
    Unserializable,
    SubmissionFailed,
}

struct PublisherState {
    parameter_store: Arc<dyn ParameterStore>,
    queue_parameter: String,
    endpoint: RwLock<QueueEndpoint>,
    transport_factory: TransportFactory,
    transport: OnceCell<Arc<dyn QueueTransport>>,
}

/// Best-effort publisher of partial [`MetricRecord`]s.
///
/// The queue endpoint is looked up lazily and retried on every publish until
/// it resolves; afterwards it is reused for the life of the publisher. The
/// transport is built once, on the first publish that has a destination.
/// Lookup, serialization and submission all run on a detached task, so the
/// caller never waits on telemetry and never sees an error.
pub struct MetricPublisher {
    state: Arc<PublisherState>,
}

impl MetricPublisher {
    pub fn new(
        parameter_store: Arc<dyn ParameterStore>,
        queue_parameter: impl Into<String>,
        transport_factory: TransportFactory,
    ) -> Self {
        Self {
            state: Arc::new(PublisherState {
                parameter_store,
                queue_parameter: queue_parameter.into(),
                endpoint: RwLock::new(QueueEndpoint::Unresolved),
                transport_factory,
                transport: OnceCell::new(),
            }),
        }
    }

    pub fn endpoint(&self) -> QueueEndpoint {
        self.state.endpoint()
    }

    /// Fire and forget. Must be called from within a tokio runtime.
    pub fn publish(&self, record: &MetricRecord) {
        // Dropping the handle detaches the task.
        drop(self.publish_tracked(record));
    }

    /// Like [`publish`](Self::publish), returning the handle of the detached
    /// task for callers that need to outlive it.
    pub fn publish_tracked(&self, record: &MetricRecord) -> JoinHandle<PublishOutcome> {
        let state = self.state.clone();
        let record = record.clone();
        tokio::spawn(async move { state.deliver(record).await })
    }
}

impl PublisherState {
    fn endpoint(&self) -> QueueEndpoint {
        self.endpoint.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    async fn deliver(&self, record: MetricRecord) -> PublishOutcome {
        let destination = match self.resolve_endpoint().await {
            QueueEndpoint::Resolved(destination) => destination,
            QueueEndpoint::Unresolved => {
                warn!("Failed to get the queue URL to publish metric to, skipping this record");
                return PublishOutcome::Unresolved;
            }
        };

        let transport = match self
            .transport
            .get_or_try_init(|| async { (self.transport_factory)() })
            .await
        {
            Ok(transport) => transport.clone(),
            Err(e) => {
                error!("Failed to create metric queue transport: {}", e);
                return PublishOutcome::TransportUnavailable;
            }
        };

        let body = match record.to_message_body() {
            Ok(body) => body,
            Err(e) => {
                error!("Failed to serialize metric record: {}", e);
                return PublishOutcome::Unserializable;
            }
        };

        let message = QueueMessage { body, destination: destination.clone() };
        match transport.send_message(message).await {
            Ok(()) => {
                debug!("Metric published to {}", destination);
                PublishOutcome::Delivered
            }
            Err(e) => {
                error!("Error publishing metric to {}: {}", destination, e);
                PublishOutcome::SubmissionFailed
            }
        }
    }

    async fn resolve_endpoint(&self) -> QueueEndpoint {
        let current = self.endpoint();
        if current != QueueEndpoint::Unresolved {
            return current;
        }

        // Concurrent first publishes may both look up; the last writer wins.
        match self.parameter_store.get_parameter(&self.queue_parameter).await {
            Ok(destination) => {
                info!("Resolved metric queue {} from {}", destination, self.queue_parameter);
                let resolved = QueueEndpoint::Resolved(destination);
                *self.endpoint.write().unwrap_or_else(|p| p.into_inner()) = resolved.clone();
                resolved
            }
            Err(e) => {
                error!("Failed to resolve metric queue parameter {}: {}", self.queue_parameter, e);
                QueueEndpoint::Unresolved
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BundlerError;
    use async_trait::async_trait;
    use ethers::types::U256;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    struct FlakyStore {
        calls: AtomicUsize,
        healthy: AtomicBool,
    }

    impl FlakyStore {
        fn new(healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                healthy: AtomicBool::new(healthy),
            })
        }
    }

    #[async_trait]
    impl ParameterStore for FlakyStore {
        async fn get_parameter(&self, _name: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy.load(Ordering::SeqCst) {
                Ok("https://queue.example/std".to_string())
            } else {
                Err(BundlerError::TelemetryError("parameter store unavailable".to_string()))
            }
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        fail: bool,
        sent: Mutex<Vec<QueueMessage>>,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl QueueTransport for RecordingTransport {
        async fn send_message(&self, message: QueueMessage) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BundlerError::TelemetryError("queue rejected message".to_string()));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn publisher_with(
        store: Arc<FlakyStore>,
        transport: Arc<RecordingTransport>,
        builds: Arc<AtomicUsize>,
    ) -> MetricPublisher {
        MetricPublisher::new(
            store,
            DEFAULT_QUEUE_PARAMETER,
            Box::new(move || -> Result<Arc<dyn QueueTransport>> {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(transport.clone() as Arc<dyn QueueTransport>)
            }),
        )
    }

    #[tokio::test]
    async fn test_failing_store_skips_publish() {
        let store = FlakyStore::new(false);
        let transport = Arc::new(RecordingTransport::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let publisher = publisher_with(store.clone(), transport.clone(), builds.clone());

        let record = MetricRecord::new().with_chain_id(1);
        assert_eq!(publisher.publish_tracked(&record).await.unwrap(), PublishOutcome::Unresolved);
        assert_eq!(publisher.publish_tracked(&record).await.unwrap(), PublishOutcome::Unresolved);

        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(builds.load(Ordering::SeqCst), 0);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(publisher.endpoint(), QueueEndpoint::Unresolved);
    }

    #[tokio::test]
    async fn test_failing_transport_is_swallowed() {
        let store = FlakyStore::new(true);
        let transport = Arc::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });
        let builds = Arc::new(AtomicUsize::new(0));
        let publisher = publisher_with(store, transport.clone(), builds);

        let outcome = publisher
            .publish_tracked(&MetricRecord::new().with_actual_gas(U256::from(90_000u64)))
            .await
            .unwrap();

        assert_eq!(outcome, PublishOutcome::SubmissionFailed);

        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_endpoint_resolves_once() {
        let store = FlakyStore::new(true);
        let transport = Arc::new(RecordingTransport::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let publisher = publisher_with(store.clone(), transport.clone(), builds.clone());

        for gas in [1u64, 2, 3] {
            let record = MetricRecord::new().with_actual_gas(U256::from(gas));
            assert_eq!(publisher.publish_tracked(&record).await.unwrap(), PublishOutcome::Delivered);
        }

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(
            publisher.endpoint(),
            QueueEndpoint::Resolved("https://queue.example/std".to_string())
        );

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|m| m.destination == "https://queue.example/std"));
        assert_eq!(sent[0].body, r#"{"actualGas":"0x1"}"#);
    }

    #[tokio::test]
    async fn test_store_recovers_after_outage() {
        let store = FlakyStore::new(false);
        let transport = Arc::new(RecordingTransport::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let publisher = publisher_with(store.clone(), transport.clone(), builds);

        let record = MetricRecord::new().with_chain_id(137);
        assert_eq!(publisher.publish_tracked(&record).await.unwrap(), PublishOutcome::Unresolved);

        store.healthy.store(true, Ordering::SeqCst);
        assert_eq!(publisher.publish_tracked(&record).await.unwrap(), PublishOutcome::Delivered);
        assert_eq!(publisher.publish_tracked(&record).await.unwrap(), PublishOutcome::Delivered);

        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(transport.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_transport_factory_failure_is_retried_later() {
        let store = FlakyStore::new(true);
        let fail_build = Arc::new(AtomicBool::new(true));
        let transport = Arc::new(RecordingTransport::default());

        let fail_flag = fail_build.clone();
        let delivered = transport.clone();
        let publisher = MetricPublisher::new(
            store,
            DEFAULT_QUEUE_PARAMETER,
            Box::new(move || -> Result<Arc<dyn QueueTransport>> {
                if fail_flag.load(Ordering::SeqCst) {
                    Err(BundlerError::ConfigError("no credentials".to_string()))
                } else {
                    Ok(delivered.clone() as Arc<dyn QueueTransport>)
                }
            }),
        );

        let record = MetricRecord::new().with_chain_id(10);
        assert_eq!(
            publisher.publish_tracked(&record).await.unwrap(),
            PublishOutcome::TransportUnavailable
        );

        fail_build.store(false, Ordering::SeqCst);
        assert_eq!(publisher.publish_tracked(&record).await.unwrap(), PublishOutcome::Delivered);
        assert_eq!(transport.sent.lock().unwrap().len(), 1);
    }

    struct SlowStore {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ParameterStore for SlowStore {
        async fn get_parameter(&self, _name: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Err(BundlerError::TelemetryError("parameter store timed out".to_string()))
        }
    }

    #[tokio::test]
    async fn test_slow_store_does_not_block_caller() {
        let store = Arc::new(SlowStore {
            delay: Duration::from_millis(800),
            calls: AtomicUsize::new(0),
        });
        let transport = Arc::new(RecordingTransport::default());
        let builds = Arc::new(AtomicUsize::new(0));
        let factory_builds = builds.clone();
        let publisher = MetricPublisher::new(
            store.clone(),
            DEFAULT_QUEUE_PARAMETER,
            Box::new(move || -> Result<Arc<dyn QueueTransport>> {
                factory_builds.fetch_add(1, Ordering::SeqCst);
                Ok(transport.clone() as Arc<dyn QueueTransport>)
            }),
        );

        let record = MetricRecord::new().with_chain_id(1);
        let started = Instant::now();
        publisher.publish(&record);
        let tracked = publisher.publish_tracked(&record);
        assert!(started.elapsed() < Duration::from_millis(100));

        assert_eq!(tracked.await.unwrap(), PublishOutcome::Unresolved);
        assert!(started.elapsed() >= Duration::from_millis(800));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }
}
