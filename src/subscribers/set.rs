//! # Per-boot fan-out of bus events to subscribers.
//!
//! [`SubscriberSet`] is built fresh for every boot from the same subscriber
//! instances. Each subscriber gets its own bounded queue and delivery task, so
//! a slow `LogWriter` never holds back a metrics sink, and neither of them can
//! hold back the producer.
//!
//! ```text
//! emit(event) ──try_send──► queue("log")     ──► deliver ──► LogWriter::on_event
//!             └─try_send──► queue("metrics") ──► deliver ──► Metrics::on_event
//!                               │ full
//!                               └─► dropped += 1; first drop of a streak
//!                                   publishes SubscriberOverflow { dropped }
//! ```
//!
//! At 5 values per second plus consumer events, a stuck subscriber would
//! otherwise turn every emitted event into an overflow event of its own. Drops
//! are therefore reported once per streak: the streak ends with the next event
//! the queue accepts.
//!
//! **Warning**: panics are caught with `AssertUnwindSafe`; a subscriber that
//! panics while holding a lock may leave its own state inconsistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Queue {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
    dropped: AtomicU64,
    in_streak: AtomicBool,
}

impl Queue {
    /// Counts a drop; returns the running total if this drop opens a streak.
    fn record_drop(&self) -> Option<u64> {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        (!self.in_streak.swap(true, Ordering::Relaxed)).then_some(total)
    }
}

/// Bounded per-subscriber queues plus their delivery tasks.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one delivery task per subscriber.
    ///
    /// Queue capacity is `max(queue_capacity, 1)`.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (queues, workers) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let queue = Queue {
                    name: sub.name(),
                    tx,
                    dropped: AtomicU64::new(0),
                    in_streak: AtomicBool::new(false),
                };
                (queue, tokio::spawn(deliver(sub, rx, bus.clone())))
            })
            .unzip();
        Self {
            queues,
            workers,
            bus,
        }
    }

    /// Offers `event` to every queue without waiting.
    pub fn emit(&self, event: &Event) {
        let event = Arc::new(event.clone());
        let reportable = event.kind != EventKind::SubscriberOverflow;

        for q in &self.queues {
            let reason = match q.tx.try_send(Arc::clone(&event)) {
                Ok(()) => {
                    q.in_streak.store(false, Ordering::Relaxed);
                    continue;
                }
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if let Some(total) = q.record_drop().filter(|_| reportable) {
                self.bus.publish(
                    Event::subscriber_overflow(q.name, reason)
                        .with_dropped(usize::try_from(total).unwrap_or(usize::MAX)),
                );
            }
        }
    }

    /// Events dropped for the named subscriber during this boot.
    pub fn dropped(&self, name: &str) -> u64 {
        self.queues
            .iter()
            .filter(|q| q.name == name)
            .map(|q| q.dropped.load(Ordering::Relaxed))
            .sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Closes every queue and waits until each subscriber saw its backlog.
    pub async fn shutdown(self) {
        for q in &self.queues {
            let dropped = q.dropped.load(Ordering::Relaxed);
            if dropped > 0 {
                tracing::debug!(subscriber = q.name, dropped, "subscriber missed events this boot");
            }
        }
        drop(self.queues);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn deliver(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&ev))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            let info = panic_message(payload.as_ref());
            tracing::error!(subscriber = sub.name(), %info, "subscriber panicked");
            bus.publish(Event::subscriber_panicked(sub.name(), info));
        }
    }
}

pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
