//! Webhook coalescing.
//!
//! Bursts of webhooks referencing nearby change times are redundant: one
//! query since the earliest timestamp covers them all. The coalescer keeps a
//! single-slot buffer where the earliest pending request wins, and a
//! tick-driven dispatch task that hands the survivor to the notifier. The
//! dispatch task is the only caller of `notify`, so no two cycles overlap.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{error, info};

use notifier_core::Error;

use super::notifier::ConceptNotifier;

/// Default dispatch cadence.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_secs(5);

/// One accepted webhook, reduced to the window start and the inbound
/// transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub notify_since: DateTime<Utc>,
    pub transaction_id: String,
}

/// Clock seam for the dispatch loop, substitutable in tests.
#[async_trait]
pub trait Ticker: Send + 'static {
    async fn tick(&mut self);
}

/// Production ticker over a fixed period. The first tick fires one period
/// after start, not immediately.
pub struct IntervalTicker {
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Single-slot buffer. A new request displaces the held one only when its
/// window starts earlier, so the minimum wins and ties keep the first seen.
#[derive(Default)]
struct Slot(Mutex<Option<NotificationRequest>>);

impl Slot {
    fn offer(&self, request: NotificationRequest) {
        let mut held = self.0.lock().unwrap();
        match held.as_ref() {
            Some(current) if current.notify_since <= request.notify_since => {}
            _ => *held = Some(request),
        }
    }

    fn take(&self) -> Option<NotificationRequest> {
        self.0.lock().unwrap().take()
    }
}

/// Producer half handed to the webhook handlers.
#[derive(Clone)]
pub struct CoalescerHandle {
    slot: Arc<Slot>,
    shutdown_tx: mpsc::Sender<()>,
}

impl CoalescerHandle {
    /// Buffer a request for the next dispatch tick. The offer happens on a
    /// detached task, so the caller's HTTP response never waits on the
    /// buffer or the downstream work.
    pub fn enqueue(&self, request: NotificationRequest) {
        let slot = self.slot.clone();
        tokio::spawn(async move {
            slot.offer(request);
        });
    }

    /// Stop the dispatch loop. Any residual buffered request is discarded.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Start the dispatch loop. The join handle resolves once the loop has
/// observed shutdown, letting callers wait out an in-flight notify cycle.
pub fn start(
    notifier: Arc<dyn ConceptNotifier>,
    ticker: impl Ticker,
) -> (CoalescerHandle, tokio::task::JoinHandle<()>) {
    let slot = Arc::new(Slot::default());
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

    let task = tokio::spawn(dispatch_loop(notifier, ticker, slot.clone(), shutdown_rx));

    (CoalescerHandle { slot, shutdown_tx }, task)
}

async fn dispatch_loop(
    notifier: Arc<dyn ConceptNotifier>,
    mut ticker: impl Ticker,
    slot: Arc<Slot>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Notification dispatch loop stopping");
                return;
            }
            _ = ticker.tick() => {}
        }

        let Some(request) = slot.take() else {
            continue;
        };

        // Webhooks arriving while notify runs land in the slot and are
        // handled at the next tick.
        match notifier
            .notify(request.notify_since, &request.transaction_id)
            .await
        {
            Ok(()) => {}
            Err(e @ Error::NothingToNotify { .. }) => {
                info!(transaction_id = %request.transaction_id, "{}", e);
            }
            Err(e) => {
                error!(
                    transaction_id = %request.transaction_id,
                    since = %request.notify_since,
                    error = %e,
                    "Failed to notify for a change"
                );
            }
        }
    }
}
