// src/core/queue.rs

//! The FIFO between the per-connection collectors and the single distributor.

use crate::config::{OverflowPolicy, QueueConfig};
use crate::core::RelayError;
use crate::core::metrics;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::debug;

/// What happened to a message handed to [`MessageQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The message is pending delivery.
    Queued,
    /// The queue was full and the message itself was discarded.
    DroppedNewest,
    /// The message is pending, but the oldest pending message was evicted.
    DroppedOldest,
}

#[derive(Debug, Default)]
struct QueueInner {
    items: VecDeque<String>,
    closed: bool,
}

/// A multi-producer, single-consumer queue of text messages.
///
/// Messages leave in the order they were accepted. With `capacity == 0` the
/// queue is unbounded and `enqueue` never waits; otherwise the configured
/// [`OverflowPolicy`] decides what happens at the limit.
#[derive(Debug)]
pub struct MessageQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
    policy: OverflowPolicy,
    not_empty: Notify,
    not_full: Notify,
}

impl MessageQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            capacity,
            policy,
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0, OverflowPolicy::Block)
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.capacity, config.overflow_policy)
    }

    /// Appends a message, applying the overflow policy if the queue is full.
    ///
    /// Only `OverflowPolicy::Block` on a full queue ever waits. Fails once the
    /// queue has been closed.
    pub async fn enqueue(&self, message: String) -> Result<EnqueueOutcome, RelayError> {
        loop {
            // Registered before the check so a dequeue in between is not missed.
            let space_freed = self.not_full.notified();
            {
                let mut inner = self.inner.lock();
                if inner.closed {
                    return Err(RelayError::QueueClosed);
                }

                let outcome = if self.capacity == 0 || inner.items.len() < self.capacity {
                    EnqueueOutcome::Queued
                } else {
                    match self.policy {
                        OverflowPolicy::Block => EnqueueOutcome::Queued,
                        OverflowPolicy::DropNewest => {
                            metrics::MESSAGES_DROPPED_TOTAL.inc();
                            debug!("Queue full ({}); dropping newest message.", self.capacity);
                            return Ok(EnqueueOutcome::DroppedNewest);
                        }
                        OverflowPolicy::DropOldest => {
                            inner.items.pop_front();
                            metrics::MESSAGES_DROPPED_TOTAL.inc();
                            debug!("Queue full ({}); dropping oldest message.", self.capacity);
                            EnqueueOutcome::DroppedOldest
                        }
                    }
                };

                let has_room = self.capacity == 0 || inner.items.len() < self.capacity;
                if has_room {
                    inner.items.push_back(message);
                    metrics::QUEUE_DEPTH.set(inner.items.len() as f64);
                    drop(inner);
                    self.not_empty.notify_one();
                    return Ok(outcome);
                }
            }
            space_freed.await;
        }
    }

    /// Removes the oldest message, waiting until one is available.
    ///
    /// Returns `None` once the queue is closed and every pending message has
    /// been handed out.
    pub async fn dequeue(&self) -> Option<String> {
        loop {
            let message_ready = self.not_empty.notified();
            {
                let mut inner = self.inner.lock();
                if let Some(message) = inner.items.pop_front() {
                    metrics::QUEUE_DEPTH.set(inner.items.len() as f64);
                    drop(inner);
                    self.not_full.notify_one();
                    return Some(message);
                }
                if inner.closed {
                    return None;
                }
            }
            message_ready.await;
        }
    }

    /// Removes the oldest message without waiting.
    pub fn try_dequeue(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let message = inner.items.pop_front();
        if message.is_some() {
            metrics::QUEUE_DEPTH.set(inner.items.len() as f64);
            drop(inner);
            self.not_full.notify_one();
        }
        message
    }

    /// Rejects further messages and wakes every waiter.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.not_empty.notify_waiters();
        self.not_empty.notify_one();
        self.not_full.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    /// The configured bound, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        (self.capacity != 0).then_some(self.capacity)
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.policy
    }
}
