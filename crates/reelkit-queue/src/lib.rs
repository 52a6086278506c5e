//! Durable in-process job queue.
//!
//! This crate provides:
//! - [`JobQueue`]: an in-memory priority structure fronting the durable
//!   pending set in the store, with startup rehydration and orphan sweep
//! - [`ProgressReporter`]: monotonic per-attempt progress telemetry

pub mod error;
pub mod progress;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use progress::ProgressReporter;
pub use queue::{JobQueue, QueueStats};
