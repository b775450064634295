//! Service layer: the notifier orchestration, the webhook coalescer, and
//! the health evaluator.

pub mod coalescer;
pub mod health;
pub mod notifier;

pub use coalescer::{CoalescerHandle, IntervalTicker, NotificationRequest, Ticker, DEFAULT_TICK_PERIOD};
pub use health::{HealthConfig, HealthService};
pub use notifier::{ConceptNotifier, NotifierService, DEFAULT_SETTLE_DELAY};
