//! Job definitions for queue processing.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{ProjectId, VideoId};

/// Default retry budget for a job.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
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

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Type of job, one per processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Fetch a video from a URL and normalize it
    Download,
    /// Normalize a pre-staged upload
    Upload,
    /// Transcribe audio to an SRT caption file
    Caption,
    /// Burn a caption file into the video frames
    Burn,
    /// Cut the video at detected scene boundaries
    SplitScenes,
    /// Cut the video at fixed intervals
    SplitFixed,
    /// Cut a single segment out of the video
    Trim,
    /// Re-render an existing video into the canonical 9:16 form
    ConvertAspect,
    /// Import a file staged by the remote-browser subsystem
    BrowserImport,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Download => "download",
            JobType::Upload => "upload",
            JobType::Caption => "caption",
            JobType::Burn => "burn",
            JobType::SplitScenes => "split_scenes",
            JobType::SplitFixed => "split_fixed",
            JobType::Trim => "trim",
            JobType::ConvertAspect => "convert_aspect",
            JobType::BrowserImport => "browser_import",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobType {
    type Err = UnknownJobType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "download" => Ok(JobType::Download),
            "upload" => Ok(JobType::Upload),
            "caption" => Ok(JobType::Caption),
            "burn" => Ok(JobType::Burn),
            "split_scenes" => Ok(JobType::SplitScenes),
            "split_fixed" => Ok(JobType::SplitFixed),
            "trim" => Ok(JobType::Trim),
            "convert_aspect" => Ok(JobType::ConvertAspect),
            "browser_import" => Ok(JobType::BrowserImport),
            other => Err(UnknownJobType(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized job type string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown job type: {0}")]
pub struct UnknownJobType(pub String);

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting in queue
    #[default]
    Pending,
    /// Job is being processed by a worker
    Running,
    /// Job completed successfully
    Completed,
    /// Job failed (may be retried)
    Failed,
    /// Job was cancelled
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states receive no further automatic transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownJobStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(UnknownJobStatus(other.to_string())),
        }
    }
}

/// Error returned when parsing an unrecognized job status string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown job status: {0}")]
pub struct UnknownJobStatus(pub String);

/// A persistent record of a unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Job type
    #[serde(rename = "type")]
    pub job_type: JobType,

    /// Job lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Priority (higher runs earlier)
    #[serde(default)]
    pub priority: i64,

    /// Project this job is scoped to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,

    /// Video this job is scoped to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<VideoId>,

    /// Opaque input parameters (JSON object)
    #[serde(default)]
    pub input_data: serde_json::Value,

    /// Opaque output/result (JSON object)
    #[serde(default)]
    pub output_data: serde_json::Value,

    /// Progress (0-100), monotonic within an attempt
    #[serde(default)]
    pub progress: u8,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Number of retry attempts consumed
    #[serde(default)]
    pub retry_count: u32,

    /// Maximum retries allowed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Set on the first transition to running
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// Set on the first terminal transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Job {
    /// Create a new pending job.
    pub fn new(job_type: JobType, input_data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type,
            status: JobStatus::Pending,
            priority: 0,
            project_id: None,
            video_id: None,
            input_data,
            output_data: serde_json::Value::Object(Default::default()),
            progress: 0,
            error_message: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Scope the job to a project.
    pub fn with_project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Scope the job to a video.
    pub fn with_video(mut self, video_id: VideoId) -> Self {
        self.video_id = Some(video_id);
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Whether retry budget remains.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Look up a string field in `input_data`.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input_data.get(key).and_then(|v| v.as_str())
    }

    /// Look up a numeric field in `input_data`.
    pub fn input_f64(&self, key: &str) -> Option<f64> {
        self.input_data.get(key).and_then(|v| v.as_f64())
    }

    /// Look up a boolean field in `input_data`.
    pub fn input_bool(&self, key: &str) -> Option<bool> {
        self.input_data.get(key).and_then(|v| v.as_bool())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_str() {
        for ty in [
            JobType::Download,
            JobType::Upload,
            JobType::Caption,
            JobType::Burn,
            JobType::SplitScenes,
            JobType::SplitFixed,
            JobType::Trim,
            JobType::ConvertAspect,
            JobType::BrowserImport,
        ] {
            assert_eq!(ty.as_str().parse::<JobType>().unwrap(), ty);
        }
        assert!("reticulate".parse::<JobType>().is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn job_serde_round_trip() {
        let job = Job::new(
            JobType::Trim,
            serde_json::json!({"start_time": 1.5, "end_time": 4.0, "note": {"nested": [1, 2, null]}}),
        )
        .with_priority(5);

        let json = serde_json::to_string(&job).expect("serialize job");
        let decoded: Job = serde_json::from_str(&json).expect("deserialize job");

        assert_eq!(decoded.id, job.id);
        assert_eq!(decoded.job_type, JobType::Trim);
        assert_eq!(decoded.priority, 5);
        // Unknown leaves survive the round trip untouched.
        assert_eq!(decoded.input_data, job.input_data);
    }
}
