//! Error types for smartlogic-notifier.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias using the notifier's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for notifier operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested concept does not exist in Smartlogic.
    #[error("Concept does not exist in Smartlogic: {0}")]
    ConceptNotFound(String),

    /// Five consecutive 401s were observed; the client refuses further
    /// requests until the process restarts.
    #[error("failed to get a valid access token")]
    TokenExhausted,

    /// Smartlogic answered with an unexpected status.
    #[error("Smartlogic returned HTTP {status}")]
    UpstreamStatus { status: u16 },

    /// HTTP/network request failed.
    #[error("Request error: {0}")]
    Request(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The changed-concept query returned nothing. Logged by the coalescer,
    /// never surfaced to a caller.
    #[error("no changed concepts found since {since} (transaction {transaction_id})")]
    NothingToNotify {
        since: DateTime<Utc>,
        transaction_id: String,
    },

    /// At least one concept fetch or publish failed during a batch.
    #[error("There was an error with {failed} concept ingestions")]
    BatchIngest { failed: usize },

    /// Message bus producer failure.
    #[error("Producer error: {0}")]
    Producer(String),

    /// Invalid input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_error_display_concept_not_found() {
        let err = Error::ConceptNotFound("some-uuid".to_string());
        assert_eq!(
            err.to_string(),
            "Concept does not exist in Smartlogic: some-uuid"
        );
    }

    #[test]
    fn test_error_display_token_exhausted() {
        assert_eq!(
            Error::TokenExhausted.to_string(),
            "failed to get a valid access token"
        );
    }

    #[test]
    fn test_error_display_upstream_status() {
        let err = Error::UpstreamStatus { status: 503 };
        assert_eq!(err.to_string(), "Smartlogic returned HTTP 503");
    }

    #[test]
    fn test_error_display_batch_ingest() {
        let err = Error::BatchIngest { failed: 3 };
        assert_eq!(
            err.to_string(),
            "There was an error with 3 concept ingestions"
        );
    }

    #[test]
    fn test_error_display_nothing_to_notify() {
        let since = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let err = Error::NothingToNotify {
            since,
            transaction_id: "tid_test".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2024-06-01 12:00:00 UTC"));
        assert!(msg.contains("tid_test"));
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
