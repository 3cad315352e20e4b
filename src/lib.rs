//! # batchpipe-rs
//!
//! Async double-buffered batching primitives for decoupling many concurrent
//! producers from a single, possibly slow, asynchronous consumer.
//!
//! ## Features
//!
//! - **AsyncQueue**: unbounded multi-producer multi-consumer queue with
//!   non-blocking enqueue, suspending dequeue, per-caller cancellation, and a
//!   shutdown that releases every waiter
//! - **DoubleBufferTask**: producers append under a short critical section
//!   while a background loop swaps the filled buffer out in O(1) and feeds it
//!   to an async handler, strictly one batch at a time
//! - **Lossless shutdown**: `finish()` + `wait_all_finished()` guarantee that
//!   every accepted item lands in exactly one batch before completion fires
//! - **Tokio native**: suspension everywhere, no thread parked while idle or
//!   while the handler runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batchpipe_rs::DoubleBufferTask;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Batches are handed to the handler in the order they were sealed.
//!     let task = DoubleBufferTask::new(|batch: Vec<String>| async move {
//!         println!("flushing {} records", batch.len());
//!         Ok(())
//!     });
//!
//!     // Producers submit from anywhere; add_task never waits on the handler.
//!     for i in 0..1000 {
//!         task.add_task(format!("record-{i}"))?;
//!     }
//!
//!     task.finish();
//!     task.wait_all_finished().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Awaitable Queue
//!
//! ```rust,no_run
//! use batchpipe_rs::AsyncQueue;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = AsyncQueue::new();
//!     let cancel = CancellationToken::new();
//!
//!     queue.enqueue(42);
//!     while let Some(item) = queue.dequeue(&cancel).await? {
//!         println!("got {item}");
//!         queue.close(); // releases every waiter
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

// Public module exports
pub mod core;
pub mod utils;

// Re-export main types
pub use crate::core::{AsyncQueue, DoubleBufferStats, DoubleBufferTask};
pub use utils::error::{PipelineError, Result};

// Version information
/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Description of the crate
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
