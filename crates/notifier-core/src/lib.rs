//! Shared types for smartlogic-notifier.
//!
//! This crate holds the pieces every other crate depends on: the error type,
//! the traits implemented by the Smartlogic client and the Kafka producer,
//! the FT message framing, and the structured-logging field constants.

pub mod error;
pub mod logging;
pub mod message;
pub mod traits;

pub use error::{Error, Result};
pub use message::{FtMessage, FTMSG_MAGIC, TRANSACTION_ID_HEADER};
pub use traits::{ConceptStore, MessageProducer};
