pub mod publisher;
pub mod transport;

pub use publisher::{MetricPublisher, PublishOutcome, QueueEndpoint, TransportFactory, DEFAULT_QUEUE_PARAMETER};
pub use transport::{
    EnvParameterStore, HttpQueueTransport, ParameterStore, QueueMessage, QueueTransport,
    StaticParameterStore,
};
