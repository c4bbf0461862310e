//! # Bounded FIFO channel with drop-newest backpressure.
//!
//! [`BoundedChannel`] is the only data path between the producer and the consumer.
//!
//! ## Rules
//! - `len() <= capacity` at all times.
//! - `send` never waits longer than its timeout; with `None` it is a pure attempt.
//!   On full the **new** item is rejected and the queued items are kept.
//! - `recv` waits up to its timeout; a timeout has no side effect on the contents.
//! - `reset` discards every queued item in one critical section.
//!
//! ## Wakeups
//! ```text
//! send ──push──► [VecDeque] ──pop──► recv
//!   │                                  ▲
//!   └──── items.notify_one() ──────────┘
//! recv / reset ── space.notify_waiters() ──► blocked send (timeout > 0)
//! ```
//!
//! Waiters register their `Notified` future **before** re-checking the queue,
//! so a push between the check and the await is never missed.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

use crate::error::{RecvError, SendError};

/// Fixed-capacity FIFO shared by one writer and one reader.
#[derive(Debug)]
pub struct BoundedChannel<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    items: Notify,
    space: Notify,
}

impl<T> BoundedChannel<T> {
    /// Creates an empty channel holding at most `capacity` items (min 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            items: Notify::new(),
            space: Notify::new(),
        }
    }

    /// Maximum number of queued items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Enqueues `item`, waiting up to `timeout` for space.
    ///
    /// `None` (or a zero duration) never waits: a full channel rejects the item at once.
    pub async fn send(&self, item: T, timeout: Option<Duration>) -> Result<(), SendError<T>> {
        let item = match self.try_send(item) {
            Ok(()) => return Ok(()),
            Err(SendError::Full(item)) => item,
        };
        let Some(dur) = timeout.filter(|d| !d.is_zero()) else {
            return Err(SendError::Full(item));
        };

        let deadline = Instant::now() + dur;
        let mut item = item;
        loop {
            let notified = self.space.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            item = match self.try_send(item) {
                Ok(()) => return Ok(()),
                Err(SendError::Full(item)) => item,
            };
            if time::timeout_at(deadline, notified).await.is_err() {
                return self.try_send(item);
            }
        }
    }

    /// Non-blocking enqueue attempt.
    pub fn try_send(&self, item: T) -> Result<(), SendError<T>> {
        let mut queue = self.lock();
        if queue.len() >= self.capacity {
            return Err(SendError::Full(item));
        }
        queue.push_back(item);
        drop(queue);
        self.items.notify_one();
        Ok(())
    }

    /// Dequeues the oldest item, waiting up to `timeout` for one to arrive.
    pub async fn recv(&self, timeout: Duration) -> Result<T, RecvError> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.items.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_recv() {
                return Ok(item);
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return self.try_recv().ok_or(RecvError::TimedOut { timeout });
            }
        }
    }

    /// Non-blocking dequeue attempt.
    pub fn try_recv(&self) -> Option<T> {
        let item = self.lock().pop_front();
        if item.is_some() {
            self.space.notify_waiters();
        }
        item
    }

    /// Discards all queued items atomically. Returns how many were dropped.
    ///
    /// Resetting an empty channel is a no-op.
    pub fn reset(&self) -> usize {
        let dropped = {
            let mut queue = self.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        if dropped > 0 {
            self.space.notify_waiters();
        }
        dropped
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // Every critical section leaves the deque consistent; a poisoned lock is still usable.
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_fifo_order() {
        let ch = BoundedChannel::new(4);
        for v in 1..=3 {
            ch.send(v, None).await.unwrap();
        }
        assert_eq!(ch.recv(Duration::from_millis(10)).await, Ok(1));
        assert_eq!(ch.recv(Duration::from_millis(10)).await, Ok(2));
        assert_eq!(ch.recv(Duration::from_millis(10)).await, Ok(3));
    }

    #[tokio::test]
    async fn test_full_send_drops_newest_and_keeps_contents() {
        let ch = BoundedChannel::new(10);
        for v in 1..=10 {
            ch.send(v, None).await.unwrap();
        }
        assert_eq!(ch.send(11, None).await, Err(SendError::Full(11)));
        assert_eq!(ch.len(), 10);
        for v in 1..=10 {
            assert_eq!(ch.try_recv(), Some(v));
        }
        assert!(ch.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_len_never_exceeds_capacity() {
        let ch = BoundedChannel::new(3);
        for v in 0..50u32 {
            let _ = ch.send(v, None).await;
            if v % 4 == 0 {
                let _ = ch.try_recv();
            }
            assert!(ch.len() <= ch.capacity());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_times_out_without_side_effects() {
        let ch: BoundedChannel<i32> = BoundedChannel::new(2);
        let start = Instant::now();
        let res = ch.recv(Duration::from_millis(2000)).await;
        assert_eq!(
            res,
            Err(RecvError::TimedOut {
                timeout: Duration::from_millis(2000)
            })
        );
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
        assert!(ch.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recv_wakes_on_send() {
        let ch = Arc::new(BoundedChannel::new(2));
        let tx = Arc::clone(&ch);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(300)).await;
            tx.send(7, None).await.unwrap();
        });
        let start = Instant::now();
        assert_eq!(ch.recv(Duration::from_secs(2)).await, Ok(7));
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_send_waits_for_space() {
        let ch = Arc::new(BoundedChannel::new(1));
        ch.send(1, None).await.unwrap();
        let rx = Arc::clone(&ch);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            rx.try_recv();
        });
        assert_eq!(ch.send(2, Some(Duration::from_millis(500))).await, Ok(()));
        assert_eq!(ch.try_recv(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_send_gives_up() {
        let ch = BoundedChannel::new(1);
        ch.send(1, None).await.unwrap();
        let res = ch.send(2, Some(Duration::from_millis(100))).await;
        assert_eq!(res.map_err(SendError::into_inner), Err(2));
        assert_eq!(ch.try_recv(), Some(1));
    }

    #[test]
    fn test_reset_clears_and_is_idempotent() {
        let ch = BoundedChannel::new(4);
        ch.try_send(1).unwrap();
        ch.try_send(2).unwrap();
        assert_eq!(ch.reset(), 2);
        assert!(ch.is_empty());
        assert_eq!(ch.reset(), 0);
        assert!(ch.is_empty());
    }
}
