//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("whisper binary not found: {0}")]
    WhisperNotFound(String),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("download failed: {message}")]
    DownloadFailed { message: String },

    #[error("transcription failed: {message}")]
    TranscriptionFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid video file: {0}")]
    InvalidVideo(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Create a transcription failure error.
    pub fn transcription_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::TranscriptionFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Captured stderr, when the underlying tool produced any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed { stderr, .. }
            | MediaError::FfprobeFailed { stderr, .. }
            | MediaError::TranscriptionFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }

    /// True for failures worth retrying within the job's retry budget
    /// (network hiccups, timeouts), false for deterministic ones.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MediaError::DownloadFailed { .. }
                | MediaError::Timeout(_)
                | MediaError::Http(_)
                | MediaError::Io(_)
        )
    }
}
