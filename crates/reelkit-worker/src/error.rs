//! Handler error taxonomy.
//!
//! Each variant carries a retry policy: the worker consults
//! [`HandlerError::is_retryable`] before spending a retry slot.

use thiserror::Error;

use reelkit_media::MediaError;
use reelkit_store::StoreError;

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Failure modes a handler can report.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Bad or missing job input. Never retried.
    #[error("validation: {0}")]
    Validation(String),

    /// A referenced entity or its bytes are missing. Never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transient I/O (network, store). Retried within budget.
    #[error("transient IO: {0}")]
    TransientIo(String),

    /// An external tool exited non-zero. Retried within budget.
    #[error("tool failure: {message}")]
    ToolFailure {
        message: String,
        stderr: Option<String>,
    },

    /// A tool adapter timed out. Retried within budget.
    #[error("timed out after {0} seconds")]
    Timeout(u64),

    /// The job was cancelled between tool invocations.
    #[error("cancelled")]
    Cancelled,

    /// Programmer error or unknown job type. Terminal, never retried.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl HandlerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Whether this failure is worth a retry slot.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HandlerError::TransientIo(_)
                | HandlerError::ToolFailure { .. }
                | HandlerError::Timeout(_)
        )
    }

    /// The error message recorded on the job row, with tool stderr appended
    /// when present.
    pub fn job_message(&self) -> String {
        match self {
            HandlerError::ToolFailure {
                message,
                stderr: Some(stderr),
            } if !stderr.is_empty() => format!("{message}\n{stderr}"),
            other => other.to_string(),
        }
    }
}

impl From<MediaError> for HandlerError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::Cancelled => HandlerError::Cancelled,
            MediaError::Timeout(secs) => HandlerError::Timeout(secs),
            MediaError::FileNotFound(path) => {
                HandlerError::NotFound(format!("file not found: {}", path.display()))
            }
            MediaError::InvalidTimestamp(msg) => HandlerError::Validation(msg),
            MediaError::InvalidVideo(msg) => HandlerError::Validation(msg),
            MediaError::DownloadFailed { message } => HandlerError::TransientIo(message),
            MediaError::Http(e) => HandlerError::TransientIo(e.to_string()),
            MediaError::Io(e) => HandlerError::TransientIo(e.to_string()),
            MediaError::FfmpegNotFound
            | MediaError::FfprobeNotFound
            | MediaError::YtDlpNotFound => HandlerError::Fatal(e.to_string()),
            MediaError::WhisperNotFound(bin) => {
                HandlerError::Fatal(format!("whisper binary not found: {bin}"))
            }
            MediaError::FfmpegFailed {
                message,
                stderr,
                exit_code,
            } => HandlerError::ToolFailure {
                message: match exit_code {
                    Some(code) => format!("{message} (exit {code})"),
                    None => message,
                },
                stderr,
            },
            MediaError::FfprobeFailed { message, stderr } => {
                HandlerError::ToolFailure { message, stderr }
            }
            MediaError::TranscriptionFailed { message, stderr } => {
                HandlerError::ToolFailure { message, stderr }
            }
            MediaError::JsonParse(e) => HandlerError::ToolFailure {
                message: format!("malformed tool output: {e}"),
                stderr: None,
            },
        }
    }
}

impl From<StoreError> for HandlerError {
    fn from(e: StoreError) -> Self {
        // The store already retried lock contention internally; what
        // escapes is treated as transient so a crashed write gets another
        // attempt rather than failing the job outright.
        HandlerError::TransientIo(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_per_variant() {
        assert!(!HandlerError::validation("x").is_retryable());
        assert!(!HandlerError::not_found("x").is_retryable());
        assert!(!HandlerError::fatal("x").is_retryable());
        assert!(!HandlerError::Cancelled.is_retryable());
        assert!(HandlerError::TransientIo("x".into()).is_retryable());
        assert!(HandlerError::Timeout(5).is_retryable());
        assert!(HandlerError::ToolFailure {
            message: "x".into(),
            stderr: None
        }
        .is_retryable());
    }

    #[test]
    fn job_message_includes_stderr() {
        let err = HandlerError::ToolFailure {
            message: "FFmpeg exited with non-zero status (exit 1)".into(),
            stderr: Some("Unknown encoder 'libx265'".into()),
        };
        let msg = err.job_message();
        assert!(msg.contains("exit 1"));
        assert!(msg.contains("Unknown encoder"));
    }

    #[test]
    fn media_errors_map_to_taxonomy() {
        assert!(matches!(
            HandlerError::from(MediaError::Cancelled),
            HandlerError::Cancelled
        ));
        assert!(matches!(
            HandlerError::from(MediaError::Timeout(600)),
            HandlerError::Timeout(600)
        ));
        assert!(matches!(
            HandlerError::from(MediaError::download_failed("conn reset")),
            HandlerError::TransientIo(_)
        ));
        assert!(matches!(
            HandlerError::from(MediaError::FfmpegNotFound),
            HandlerError::Fatal(_)
        ));
    }
}
