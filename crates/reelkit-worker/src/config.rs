//! Worker configuration.

use std::time::Duration;

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of long-lived workers
    pub num_workers: usize,
    /// Queue pop timeout; bounds how fast workers observe the stop signal
    pub poll_interval: Duration,
    /// Download timeout
    pub download_timeout: Duration,
    /// Encoder timeout per invocation
    pub encode_timeout: Duration,
    /// How long to wait for in-flight jobs on shutdown
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            poll_interval: Duration::from_secs(1),
            download_timeout: Duration::from_secs(300),
            encode_timeout: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            num_workers: env_parse("WORKER_COUNT").unwrap_or(defaults.num_workers),
            poll_interval: env_parse("WORKER_POLL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            download_timeout: env_parse("DOWNLOAD_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.download_timeout),
            encode_timeout: env_parse("ENCODE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.encode_timeout),
            shutdown_timeout: env_parse("WORKER_SHUTDOWN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
