//! Shared data models for the Reelkit backend.
//!
//! This crate provides Serde-serializable types for:
//! - Users, projects, videos and captions
//! - Jobs with lifecycle state and telemetry
//! - Caption styling for subtitle burning
//! - Application settings

pub mod caption;
pub mod encoding;
pub mod job;
pub mod project;
pub mod setting;
pub mod user;
pub mod video;

// Re-export common types
pub use caption::{Caption, CaptionFormat, CaptionId, CaptionStyle};
pub use encoding::EncodingConfig;
pub use job::{Job, JobId, JobStatus, JobType, DEFAULT_MAX_RETRIES};
pub use project::{Project, ProjectId};
pub use setting::Setting;
pub use user::{Role, User, UserId};
pub use video::{NewVideo, Video, VideoId};
