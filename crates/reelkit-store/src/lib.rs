//! Embedded SQLite persistence for the Reelkit backend.
//!
//! This crate provides:
//! - The [`Store`]: a WAL-mode SQLite pool with single-writer discipline
//!   and bounded retry on lock contention
//! - One typed repository per entity (users, projects, videos, captions,
//!   jobs, settings)
//!
//! All reads exclude soft-deleted rows unless explicitly asked otherwise.
//! Job status, progress and lifecycle timestamps are only ever mutated
//! through [`JobsRepo::update_status`] and [`JobsRepo::retry`].

pub mod captions;
pub mod error;
pub mod jobs;
pub mod projects;
mod rows;
pub mod schema;
pub mod settings;
pub mod store;
pub mod users;
pub mod videos;

pub use captions::CaptionsRepo;
pub use error::{StoreError, StoreResult};
pub use jobs::{JobsRepo, StatusUpdate};
pub use projects::ProjectsRepo;
pub use settings::SettingsRepo;
pub use store::{SqlValue, Store};
pub use users::UsersRepo;
pub use videos::{UpdateVideo, VideosRepo};
