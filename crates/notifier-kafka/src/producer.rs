//! Synchronous-acknowledgment Kafka producer.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::error;

use notifier_core::{Error, FtMessage, MessageProducer, Result};

/// How long a produced message may sit in the delivery queue.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata probes must answer well inside a readiness check.
const METADATA_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration for the Kafka producer.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated broker list.
    pub brokers: String,
    /// Topic every message is published to.
    pub topic: String,
}

/// Producer publishing FT messages to a single topic.
///
/// Waits for acknowledgment from all in-sync replicas before reporting a
/// send as successful.
pub struct KafkaProducer {
    producer: FutureProducer,
    topic: String,
}

impl KafkaProducer {
    pub fn new(config: KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("acks", "all")
            .set("message.send.max.retries", "10")
            .set(
                "message.timeout.ms",
                DELIVERY_TIMEOUT.as_millis().to_string(),
            )
            .create()
            .map_err(|e| {
                error!(op = "new", error = %e, "Error creating the producer");
                Error::Producer(format!("error creating the producer: {}", e))
            })?;

        Ok(Self {
            producer,
            topic: config.topic,
        })
    }
}

#[async_trait]
impl MessageProducer for KafkaProducer {
    async fn send_message(&self, message: &FtMessage) -> Result<()> {
        let payload = message.build();
        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(payload.as_slice());

        self.producer
            .send(record, DELIVERY_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|(e, _)| {
                error!(op = "send_message", error = %e, "Error sending a Kafka message");
                Error::Producer(e.to_string())
            })
    }

    async fn connectivity_check(&self) -> Result<()> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        // fetch_metadata blocks on the broker round trip.
        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), METADATA_TIMEOUT)
                .map(|_| ())
                .map_err(|e| Error::Producer(e.to_string()))
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }
}
