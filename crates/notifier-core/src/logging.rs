//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |

/// Transaction id of the inbound request that triggered the work.
pub const TRANSACTION_ID: &str = "transaction_id";

/// Freshly minted transaction id attached to a published message.
pub const CONCEPT_TRANSACTION_ID: &str = "concept_transaction_id";

/// Concept UUID being operated on.
pub const CONCEPT_UUID: &str = "uuid";

/// Logical operation name.
/// Examples: "get_concept", "get_changed_concept_list", "notify"
pub const OPERATION: &str = "op";

/// Lower bound of a changed-concept window, ISO-8601.
pub const SINCE: &str = "since";

/// Number of items returned by a query or processed by a batch.
pub const RESULT_COUNT: &str = "result_count";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
