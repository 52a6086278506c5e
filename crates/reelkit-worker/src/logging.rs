//! Structured job logging.

use tracing::{error, info, warn};

use reelkit_models::JobId;

/// Consistent per-job logging with job id and operation context.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn start(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "job started: {message}");
    }

    pub fn progress(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "job progress: {message}");
    }

    pub fn warning(&self, message: &str) {
        warn!(job_id = %self.job_id, operation = self.operation, "job warning: {message}");
    }

    pub fn failure(&self, message: &str) {
        error!(job_id = %self.job_id, operation = self.operation, "job failed: {message}");
    }

    pub fn completion(&self, message: &str) {
        info!(job_id = %self.job_id, operation = self.operation, "job completed: {message}");
    }
}
