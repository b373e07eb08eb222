// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded queue of pending records between the facade and the writer daemon.
//!
//! `push` is the request path and never blocks: a full queue engages the
//! configured [`DropPolicy`] and counts the casualty instead of creating
//! backpressure on request handling.  `drain` is the daemon path and blocks
//! with a timeout so the daemon can run periodic rotation checks even when
//! idle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::config::DropPolicy;
use crate::log_record::LogRecord;

#[derive(Debug)]
pub(crate) struct RecordQueue {
    inner: Mutex<VecDeque<LogRecord>>,
    available: Condvar,
    capacity: usize,
    policy: DropPolicy,
    /// Total records dropped under overload.  Only grows.
    dropped: AtomicU64,
    /// Portion of `dropped` already reported by the daemon.
    reported: AtomicU64,
}

impl RecordQueue {
    pub(crate) fn new(capacity: usize, policy: DropPolicy) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            available: Condvar::new(),
            capacity,
            policy,
            dropped: AtomicU64::new(0),
            reported: AtomicU64::new(0),
        }
    }

    /// Enqueues without blocking.  Returns whether the record was admitted.
    pub(crate) fn push(&self, record: LogRecord) -> bool {
        let mut queue = match self.inner.lock() {
            Ok(queue) => queue,
            // A poisoned queue means a writer panicked mid-drain; degrade to
            // dropping rather than propagating the panic into request code.
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };
        if queue.len() >= self.capacity {
            match self.policy {
                DropPolicy::Oldest => {
                    queue.pop_front();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                }
                DropPolicy::Newest => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return false;
                }
            }
        }
        queue.push_back(record);
        drop(queue);
        self.available.notify_one();
        true
    }

    /// Takes up to `max_batch` records, waiting up to `timeout` for the
    /// first one.  An empty result is either a timeout tick or a spurious
    /// wakeup; the daemon loops either way.
    pub(crate) fn drain(&self, max_batch: usize, timeout: Duration) -> Vec<LogRecord> {
        let Ok(mut queue) = self.inner.lock() else {
            return Vec::new();
        };
        if queue.is_empty() {
            let Ok((guard, _)) = self.available.wait_timeout(queue, timeout) else {
                return Vec::new();
            };
            queue = guard;
        }
        let take = queue.len().min(max_batch);
        queue.drain(..take).collect()
    }

    /// Puts an unwritten batch back at the head, preserving order.
    ///
    /// Re-queued records were already admitted once, so this may leave the
    /// queue temporarily over capacity; the bound applies to new arrivals.
    pub(crate) fn requeue_front(&self, batch: Vec<LogRecord>) {
        if let Ok(mut queue) = self.inner.lock() {
            for record in batch.into_iter().rev() {
                queue.push_front(record);
            }
        }
    }

    /// Wakes a blocked `drain` immediately, e.g. when shutdown is flagged.
    pub(crate) fn wake(&self) {
        self.available.notify_all();
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub(crate) fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drops accumulated since the last call, for the daemon's periodic
    /// overload notice.
    pub(crate) fn dropped_since_last_report(&self) -> u64 {
        let total = self.dropped.load(Ordering::Relaxed);
        let previous = self.reported.swap(total, Ordering::Relaxed);
        total.saturating_sub(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Level;
    use crate::log_record::{Fields, Origin};

    fn record(message: &str) -> LogRecord {
        LogRecord::new(Level::Info, message.to_string(), Fields::new(), Origin::caller())
    }

    fn messages(batch: &[LogRecord]) -> Vec<&str> {
        batch.iter().map(|r| r.message()).collect()
    }

    #[test]
    fn fifo_within_a_producer() {
        let queue = RecordQueue::new(16, DropPolicy::Oldest);
        for i in 0..5 {
            queue.push(record(&format!("m{i}")));
        }
        let batch = queue.drain(10, Duration::from_millis(1));
        assert_eq!(messages(&batch), vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn overload_drops_oldest_and_counts() {
        let queue = RecordQueue::new(4, DropPolicy::Oldest);
        for i in 0..10 {
            queue.push(record(&format!("m{i}")));
        }
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.dropped_total(), 6);
        let batch = queue.drain(10, Duration::from_millis(1));
        // The newest records survive under drop-oldest.
        assert_eq!(messages(&batch), vec!["m6", "m7", "m8", "m9"]);
    }

    #[test]
    fn overload_drop_newest_keeps_backlog() {
        let queue = RecordQueue::new(3, DropPolicy::Newest);
        for i in 0..6 {
            queue.push(record(&format!("m{i}")));
        }
        assert_eq!(queue.dropped_total(), 3);
        let batch = queue.drain(10, Duration::from_millis(1));
        assert_eq!(messages(&batch), vec!["m0", "m1", "m2"]);
    }

    #[test]
    fn drain_times_out_when_idle() {
        let queue = RecordQueue::new(4, DropPolicy::Oldest);
        let start = std::time::Instant::now();
        let batch = queue.drain(10, Duration::from_millis(20));
        assert!(batch.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn requeue_front_preserves_order() {
        let queue = RecordQueue::new(8, DropPolicy::Oldest);
        for i in 0..4 {
            queue.push(record(&format!("m{i}")));
        }
        let batch = queue.drain(2, Duration::from_millis(1));
        assert_eq!(messages(&batch), vec!["m0", "m1"]);
        queue.requeue_front(batch);
        let all = queue.drain(10, Duration::from_millis(1));
        assert_eq!(messages(&all), vec!["m0", "m1", "m2", "m3"]);
    }

    #[test]
    fn drop_reporting_is_a_delta() {
        let queue = RecordQueue::new(2, DropPolicy::Oldest);
        for i in 0..5 {
            queue.push(record(&format!("m{i}")));
        }
        assert_eq!(queue.dropped_since_last_report(), 3);
        assert_eq!(queue.dropped_since_last_report(), 0);
        queue.push(record("m5"));
        assert_eq!(queue.dropped_since_last_report(), 1);
    }
}
