//! Smartlogic API client.
//!
//! Implements [`notifier_core::ConceptStore`] against a single Smartlogic
//! model: single-concept fetches, the changed-concept-list query, and the
//! apikey/bearer credential dance with bounded 401 recovery.

pub mod client;
pub mod model;

pub use client::{
    SmartlogicClient, SmartlogicConfig, DEFAULT_CONCEPT_URI_PREFIX, DEFAULT_CREDENTIALS_URL,
    DEFAULT_TIMEOUT,
};
