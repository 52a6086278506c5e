//! Job execution for the Reelkit backend.
//!
//! This crate provides:
//! - The fixed-size [`WorkerPool`] pulling from the durable queue
//! - One [`JobHandler`] per pipeline (download, upload, caption, burn,
//!   scene/fixed splitting, trim, browser import)
//! - The [`HandlerError`] taxonomy mapping failures to retry policy
//! - A linear-backoff retry helper for flaky external calls

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod pool;
pub mod retry;

pub use config::WorkerConfig;
pub use context::HandlerContext;
pub use error::{HandlerError, HandlerResult};
pub use handlers::{default_registry, JobHandler};
pub use logging::JobLogger;
pub use pool::{WorkerPool, WorkerState};
pub use retry::{retry_with, RetryPolicy};
