//! Traits at the seams between the notifier and its collaborators.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::message::FtMessage;

/// Read access to the taxonomy store.
///
/// Implemented by the Smartlogic client; mocked in service tests.
#[async_trait]
pub trait ConceptStore: Send + Sync {
    /// Fetch the raw serialized representation of a single concept.
    ///
    /// Returns [`crate::Error::ConceptNotFound`] when the store reports the
    /// concept does not exist.
    async fn get_concept(&self, uuid: &str) -> Result<Vec<u8>>;

    /// List the UUIDs of concepts changed since the given instant.
    async fn get_changed_concept_list(&self, since: DateTime<Utc>) -> Result<Vec<String>>;

    /// Current bearer token, for diagnostics.
    async fn access_token(&self) -> String;
}

/// Producer end of the event bus.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    /// Publish one message; at-least-once, no local retry.
    async fn send_message(&self, message: &FtMessage) -> Result<()>;

    /// Live connectivity probe. Expected to be cheap.
    async fn connectivity_check(&self) -> Result<()>;
}
