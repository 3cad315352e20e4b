//! Double-buffered batching task
//!
//! Any number of producers append items cheaply while a single background
//! consumer loop periodically swaps the filled write buffer out and feeds it
//! to a user-supplied asynchronous handler. Producers are only ever excluded
//! for the duration of an append or an O(1) buffer swap, never for the
//! duration of handler execution.
//!
//! The consumer loop:
//!
//! 1. waits until the write buffer is non-empty or finish was requested,
//! 2. swaps the write buffer out under the lock (`mem::take`, a pointer
//!    exchange) so producers immediately write into a fresh buffer,
//! 3. invokes the handler with the sealed batch and awaits it (handler
//!    invocations never overlap),
//! 4. fires the single-shot completion signal once finish was requested and
//!    everything submitted has been handled.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{Notify, watch};
use tracing::{debug, warn};

use crate::utils::error::{PipelineError, Result};

/// Snapshot of a batching task's progress counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoubleBufferStats {
    /// Number of batches handed to the handler so far
    pub batches_handled: u64,
    /// Total items across all handled batches
    pub items_handled: u64,
    /// Items currently sitting in the write buffer
    pub pending: usize,
}

struct Shared<T> {
    /// Current write buffer. The lock covers append and swap only; it is
    /// never held across an await.
    write_buf: Mutex<Vec<T>>,
    /// Wakes the consumer loop when data arrives or finish is requested
    wakeup: Notify,
    /// Producers declared that no more items will arrive
    finished: AtomicBool,
    /// Completion signal fired; set only while holding `write_buf`
    completed: AtomicBool,
    /// First handler failure, surfaced by `wait_all_finished`
    failure: Mutex<Option<PipelineError>>,
    batches_handled: AtomicU64,
    items_handled: AtomicU64,
}

/// Batching task that decouples producers from a slow asynchronous consumer
///
/// Construction spawns the consumer loop on the ambient Tokio runtime, so it
/// must happen inside one. The handle is cheaply cloneable; hand clones to
/// producer tasks and keep one for the [`DoubleBufferTask::finish`] /
/// [`DoubleBufferTask::wait_all_finished`] shutdown pair.
///
/// Every item ever accepted by [`DoubleBufferTask::add_task`] appears in
/// exactly one handler invocation, exactly once, before
/// [`DoubleBufferTask::wait_all_finished`] completes. Items added after
/// `finish()` but before completion are still included in some batch.
///
/// # Example
///
/// ```rust,no_run
/// use batchpipe_rs::DoubleBufferTask;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let task = DoubleBufferTask::new(|batch: Vec<u32>| async move {
///         println!("handling {} items", batch.len());
///         Ok(())
///     });
///
///     for i in 0..100 {
///         task.add_task(i)?;
///     }
///
///     task.finish();
///     task.wait_all_finished().await?;
///     Ok(())
/// }
/// ```
pub struct DoubleBufferTask<T> {
    shared: Arc<Shared<T>>,
    done: watch::Receiver<bool>,
}

impl<T: Send + 'static> DoubleBufferTask<T> {
    /// Create the task and spawn its consumer loop
    ///
    /// The handler receives each sealed batch by value and is awaited to
    /// completion before the next batch is sealed; it is never invoked for an
    /// empty buffer and never invoked concurrently with itself.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: FnMut(Vec<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let shared = Arc::new(Shared {
            write_buf: Mutex::new(Vec::new()),
            wakeup: Notify::new(),
            finished: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            failure: Mutex::new(None),
            batches_handled: AtomicU64::new(0),
            items_handled: AtomicU64::new(0),
        });
        let (done_tx, done_rx) = watch::channel(false);

        let worker = Arc::clone(&shared);
        tokio::spawn(async move {
            Self::consume(worker, handler, done_tx).await;
        });

        Self {
            shared,
            done: done_rx,
        }
    }

    async fn consume<F, Fut>(shared: Arc<Shared<T>>, mut handler: F, done_tx: watch::Sender<bool>)
    where
        F: FnMut(Vec<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        loop {
            // Wait for data or a finish request. The notified future is
            // created before the check so a wakeup between check and await
            // cannot be lost.
            loop {
                let wakeup = shared.wakeup.notified();
                if !shared.write_buf.lock().is_empty() || shared.finished.load(Ordering::Acquire) {
                    break;
                }
                wakeup.await;
            }

            // Seal the current write buffer; producers move on to a fresh one.
            let batch = std::mem::take(&mut *shared.write_buf.lock());

            if !batch.is_empty() {
                let count = batch.len() as u64;
                if let Err(err) = handler(batch).await {
                    warn!(error = %err, "batch handler failed");
                    shared.failure.lock().get_or_insert(err);
                }
                shared.batches_handled.fetch_add(1, Ordering::Relaxed);
                shared.items_handled.fetch_add(count, Ordering::Relaxed);
            }

            // The completion check holds the buffer lock so it cannot race
            // with a concurrent add_task: either the item is visible here, or
            // the producer observes `completed` and is rejected.
            let done = {
                let guard = shared.write_buf.lock();
                if shared.finished.load(Ordering::Acquire) && guard.is_empty() {
                    shared.completed.store(true, Ordering::Release);
                    true
                } else {
                    false
                }
            };

            if done {
                debug!(
                    batches = shared.batches_handled.load(Ordering::Relaxed),
                    items = shared.items_handled.load(Ordering::Relaxed),
                    "batch worker completed"
                );
                let _ = done_tx.send(true);
                return;
            }
        }
    }

    /// Submit an item for batching
    ///
    /// Appends to the current write buffer under a short critical section and
    /// signals the consumer loop. Returns quickly regardless of how long the
    /// handler takes; producers never wait on handler execution.
    ///
    /// Fails with [`PipelineError::Completed`] once the completion signal has
    /// fired; callers avoid that by serializing submissions with
    /// [`DoubleBufferTask::wait_all_finished`].
    pub fn add_task(&self, item: T) -> Result<()> {
        {
            let mut guard = self.shared.write_buf.lock();
            if self.shared.completed.load(Ordering::Acquire) {
                return Err(PipelineError::Completed(
                    "add_task after completion".to_string(),
                ));
            }
            guard.push(item);
        }
        self.shared.wakeup.notify_one();
        Ok(())
    }

    /// Declare that no further items are expected
    ///
    /// Wakes the consumer loop so it performs a final drain instead of
    /// waiting for more data. Does not block; repeated calls are no-ops.
    pub fn finish(&self) {
        if !self.shared.finished.swap(true, Ordering::AcqRel) {
            debug!("finish requested, draining remaining items");
        }
        self.shared.wakeup.notify_one();
    }

    /// Wait until every accepted item has been handled
    ///
    /// Completes once [`DoubleBufferTask::finish`] was called and both
    /// buffers are empty with no handler invocation outstanding. If `finish`
    /// is never called this future never completes.
    ///
    /// Surfaces the first handler error recorded during the run, or
    /// [`PipelineError::Worker`] if the consumer loop died (e.g. a handler
    /// panic) before reaching completion.
    pub async fn wait_all_finished(&self) -> Result<()> {
        let mut done = self.done.clone();
        done.wait_for(|finished| *finished).await.map_err(|_| {
            PipelineError::Worker("batch worker terminated before completion".to_string())
        })?;

        if let Some(err) = self.shared.failure.lock().clone() {
            return Err(err);
        }
        Ok(())
    }

    /// Snapshot of the task's progress counters
    pub fn stats(&self) -> DoubleBufferStats {
        DoubleBufferStats {
            batches_handled: self.shared.batches_handled.load(Ordering::Relaxed),
            items_handled: self.shared.items_handled.load(Ordering::Relaxed),
            pending: self.shared.write_buf.lock().len(),
        }
    }

    /// Whether the completion signal has fired
    pub fn is_completed(&self) -> bool {
        self.shared.completed.load(Ordering::Acquire)
    }
}

impl<T> Clone for DoubleBufferTask<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            done: self.done.clone(),
        }
    }
}
