//! Video metadata models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::ProjectId;

/// Unique identifier for a video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A video artifact owned by a project.
///
/// `filename` is the bare name within the artifact filesystem, never a path.
/// Derivatives (clips, burned versions) point back at their source through
/// `parent_video_id`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Video {
    /// Unique video ID
    pub id: VideoId,

    /// Owning project
    pub project_id: ProjectId,

    /// Display title
    pub title: String,

    /// Bare filename within the artifact filesystem
    pub filename: String,

    /// URL the video was fetched from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Measured duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Measured width in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Measured height in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// File size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,

    /// Whether this video was cut from another video
    #[serde(default)]
    pub is_clip: bool,

    /// Lineage pointer to the source this video was derived from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_video_id: Option<VideoId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,
}

impl Video {
    /// Basename of `filename` without its extension, used to derive caption
    /// and clip names.
    pub fn file_stem(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) => stem,
            None => &self.filename,
        }
    }
}

/// New-video parameters accepted by the videos repository.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewVideo {
    pub title: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub is_clip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_video_id: Option<VideoId>,
}

impl NewVideo {
    pub fn new(title: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            filename: filename.into(),
            ..Default::default()
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_size_bytes(mut self, size: Option<u64>) -> Self {
        self.size_bytes = size;
        self
    }

    pub fn as_clip_of(mut self, parent: VideoId) -> Self {
        self.is_clip = true;
        self.parent_video_id = Some(parent);
        self
    }

    pub fn with_parent(mut self, parent: VideoId) -> Self {
        self.parent_video_id = Some(parent);
        self
    }

    pub fn with_is_clip(mut self, is_clip: bool) -> Self {
        self.is_clip = is_clip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_stem_strips_extension() {
        let mut v = Video {
            id: VideoId::new(),
            project_id: ProjectId::new(),
            title: "t".into(),
            filename: "abc123.mp4".into(),
            source_url: None,
            duration: None,
            width: None,
            height: None,
            size_bytes: None,
            is_clip: false,
            parent_video_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_deleted: false,
        };
        assert_eq!(v.file_stem(), "abc123");

        v.filename = "no_extension".into();
        assert_eq!(v.file_stem(), "no_extension");
    }
}
