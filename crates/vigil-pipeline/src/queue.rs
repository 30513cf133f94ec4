//! Bounded inter-stage queues with explicit backpressure policies.
//!
//! Producers never block: when a queue is full the configured end is
//! dropped instead (drop-oldest keeps latency bounded on the frame path,
//! drop-newest keeps the latest rendered result stable on the result
//! path). Consumers wait with a short bounded timeout so a stop signal is
//! always observed within one interval.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

/// Which end of a full queue gives way to a new item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    /// Evict the oldest queued item to admit the newest.
    Oldest,
    /// Reject the incoming item, keeping what is queued.
    Newest,
}

/// Fixed-capacity FIFO shared between one producer and one consumer stage.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    notify: Notify,
    capacity: usize,
    policy: DropPolicy,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize, policy: DropPolicy) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity,
            policy,
        }
    }

    /// Push an item, applying the drop policy when full.
    ///
    /// Returns the dropped item, if the push displaced one.
    pub fn push(&self, item: T) -> Option<T> {
        let dropped = {
            let mut items = self.items.lock().expect("queue lock");
            if items.len() == self.capacity {
                match self.policy {
                    DropPolicy::Oldest => {
                        let evicted = items.pop_front();
                        items.push_back(item);
                        evicted
                    }
                    DropPolicy::Newest => Some(item),
                }
            } else {
                items.push_back(item);
                None
            }
        };
        self.notify.notify_one();
        dropped
    }

    /// Pop the oldest item, waiting up to `timeout` for one to arrive.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.items.lock().expect("queue lock").pop_front() {
                return Some(item);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let _ = tokio::time::timeout_at(deadline, self.notify.notified()).await;
        }
    }

    /// Pop without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().expect("queue lock").pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("queue lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
