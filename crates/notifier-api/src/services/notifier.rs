//! Resolve→fetch→publish orchestration over a concept-id list.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use notifier_core::{
    ConceptStore, Error, FtMessage, MessageProducer, Result, TRANSACTION_ID_HEADER,
};

/// How long to wait before querying for changes, absorbing the store's
/// commit lag right after it pings.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// The operations handlers and health checks need from the notifier.
#[async_trait]
pub trait ConceptNotifier: Send + Sync {
    async fn get_concept(&self, uuid: &str) -> Result<Vec<u8>>;

    async fn get_changed_concept_list(&self, since: DateTime<Utc>) -> Result<Vec<String>>;

    /// Resolve the concepts changed since `last_change` and publish each one.
    async fn notify(&self, last_change: DateTime<Utc>, transaction_id: &str) -> Result<()>;

    /// Fetch and publish the given concepts, continuing past per-id failures.
    async fn force_notify(&self, uuids: &[String], transaction_id: &str) -> Result<()>;

    async fn check_kafka_connectivity(&self) -> Result<()>;
}

/// Mint a process-unique transaction id for one published concept.
fn new_transaction_id() -> String {
    format!("tid_{}", Uuid::new_v4().simple())
}

pub struct NotifierService {
    kafka: Arc<dyn MessageProducer>,
    smartlogic: Arc<dyn ConceptStore>,
    settle_delay: Duration,
}

impl NotifierService {
    pub fn new(kafka: Arc<dyn MessageProducer>, smartlogic: Arc<dyn ConceptStore>) -> Self {
        Self {
            kafka,
            smartlogic,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

#[async_trait]
impl ConceptNotifier for NotifierService {
    async fn get_concept(&self, uuid: &str) -> Result<Vec<u8>> {
        self.smartlogic.get_concept(uuid).await
    }

    async fn get_changed_concept_list(&self, since: DateTime<Utc>) -> Result<Vec<String>> {
        self.smartlogic.get_changed_concept_list(since).await
    }

    async fn notify(&self, last_change: DateTime<Utc>, transaction_id: &str) -> Result<()> {
        if !self.settle_delay.is_zero() {
            debug!("Request received, waiting out the Smartlogic commit lag");
            tokio::time::sleep(self.settle_delay).await;
        }

        let changed = self
            .smartlogic
            .get_changed_concept_list(last_change)
            .await
            .map_err(|e| {
                error!(error = %e, "There was an error retrieving the list of changed concepts");
                e
            })?;

        if changed.is_empty() {
            return Err(Error::NothingToNotify {
                since: last_change,
                transaction_id: transaction_id.to_string(),
            });
        }

        self.force_notify(&changed, transaction_id).await
    }

    async fn force_notify(&self, uuids: &[String], transaction_id: &str) -> Result<()> {
        let mut error_map: HashMap<&str, Error> = HashMap::new();

        for uuid in uuids {
            let concept = match self.smartlogic.get_concept(uuid).await {
                Ok(concept) => concept,
                Err(e) => {
                    error_map.insert(uuid, e);
                    continue;
                }
            };

            let concept_transaction_id = new_transaction_id();
            let message = FtMessage::new(
                vec![(
                    TRANSACTION_ID_HEADER.to_string(),
                    concept_transaction_id.clone(),
                )],
                concept,
            );

            info!(
                transaction_id = %transaction_id,
                concept_transaction_id = %concept_transaction_id,
                uuid = %uuid,
                "Sending message to Kafka"
            );
            if let Err(e) = self.kafka.send_message(&message).await {
                error_map.insert(uuid, e);
            }
        }

        if !error_map.is_empty() {
            let failed = error_map.len();
            for (uuid, e) in &error_map {
                warn!(uuid = %uuid, error = %e, "Concept ingestion failed");
            }
            error!(
                result_count = failed,
                "There was an error with {} concept ingestions", failed
            );
            return Err(Error::BatchIngest { failed });
        }

        info!(result_count = uuids.len(), "Completed notification of concepts");
        Ok(())
    }

    async fn check_kafka_connectivity(&self) -> Result<()> {
        self.kafka.connectivity_check().await
    }
}
