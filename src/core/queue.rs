//! Asynchronously awaitable multi-producer queue
//!
//! Producers enqueue without ever blocking; consumers await items and are
//! suspended (not thread-parked) while the queue is empty. Closing the queue
//! wakes every waiter so no consumer can stay parked past shutdown.

use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::utils::error::{PipelineError, Result};

/// Unbounded async multi-producer multi-consumer FIFO queue
///
/// Items are stored in a lock-free segment queue; availability is tracked by
/// a semaphore holding one permit per visible item. `dequeue` waits for a
/// permit, then claims exactly one item. [`AsyncQueue::close`] drains the
/// queue and releases all waiters.
///
/// Delivery order is FIFO across the whole queue, not partitioned per
/// consumer.
pub struct AsyncQueue<T> {
    items: SegQueue<T>,
    available: Semaphore,
    closed: AtomicBool,
}

impl<T> AsyncQueue<T> {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self {
            items: SegQueue::new(),
            available: Semaphore::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Append an item and wake one waiting consumer
    ///
    /// Never blocks and never fails. After [`AsyncQueue::close`] the item is
    /// dropped: the queue has already been drained and no consumer can claim
    /// it.
    pub fn enqueue(&self, item: T) {
        if self.closed.load(Ordering::Acquire) {
            debug!("enqueue on closed queue, item dropped");
            return;
        }
        self.items.push(item);
        self.available.add_permits(1);
    }

    /// Append a batch of items, making them visible in one step
    ///
    /// Items keep their relative order. Availability is released once for the
    /// whole batch, so a burst of waiters wakes as the items become visible
    /// rather than one permit at a time.
    pub fn enqueue_many<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        if self.closed.load(Ordering::Acquire) {
            debug!("enqueue_many on closed queue, items dropped");
            return;
        }
        let mut count = 0usize;
        for item in items {
            self.items.push(item);
            count += 1;
        }
        if count > 0 {
            self.available.add_permits(count);
        }
    }

    /// Wait for an item, suspending while the queue is empty
    ///
    /// Returns `Ok(Some(item))` once one is claimed, `Ok(None)` once the
    /// queue has been closed, and `Err(PipelineError::Cancelled)` if `cancel`
    /// fires while this caller is suspended. Cancelling one caller does not
    /// disturb other waiters.
    ///
    /// A woken waiter that finds no item (a benign race with `close`) simply
    /// waits again.
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<Option<T>> {
        loop {
            let acquired = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(PipelineError::Cancelled(
                        "dequeue cancelled by caller".to_string(),
                    ));
                }
                acquired = self.available.acquire() => acquired,
            };

            match acquired {
                Ok(permit) => {
                    // The permit is consumed along with the item it stands for.
                    permit.forget();
                    if let Some(item) = self.items.pop() {
                        return Ok(Some(item));
                    }
                    // Raced with close clearing the queue; re-check.
                }
                // Semaphore closed: the queue was shut down.
                Err(_) => return Ok(None),
            }
        }
    }

    /// Claim an item without waiting
    pub fn try_dequeue(&self) -> Option<T> {
        match self.available.try_acquire() {
            Ok(permit) => {
                permit.forget();
                self.items.pop()
            }
            Err(_) => None,
        }
    }

    /// Best-effort snapshot of the queue length
    ///
    /// Immediately stale under concurrency; callers needing accuracy must
    /// synchronize externally.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the queue currently looks empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Shut the queue down, dropping buffered items and waking every waiter
    ///
    /// Idempotent. Every currently suspended and every future `dequeue` call
    /// observes `Ok(None)` instead of blocking past shutdown.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.available.close();
        let mut dropped = 0usize;
        while self.items.pop().is_some() {
            dropped += 1;
        }
        debug!(dropped, "queue closed");
    }

    /// Whether [`AsyncQueue::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<T> Default for AsyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
