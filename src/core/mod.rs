//! Core primitives for the batching pipeline
//!
//! Two cooperating pieces: an asynchronously awaitable multi-producer queue,
//! and a double-buffered batching task that feeds sealed batches to a user
//! handler while producers keep writing into a fresh buffer.

pub mod double_buffer;
pub mod queue;

// Re-export all public types
pub use double_buffer::{DoubleBufferStats, DoubleBufferTask};
pub use queue::AsyncQueue;
