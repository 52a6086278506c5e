//! Axum HTTP surface for the Reelkit backend.
//!
//! Transport-level concerns (authentication, sessions, the remote-browser
//! streaming subsystem) live outside this crate; handlers here validate
//! input, talk to the repositories and the job queue, and serve artifacts.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
