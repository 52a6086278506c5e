//! Per-job progress telemetry.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use reelkit_models::{JobId, JobStatus};
use reelkit_store::{JobsRepo, StatusUpdate};

/// Reports handler progress into the job row.
///
/// Progress is kept monotonic within an attempt: a stale update below the
/// last reported value is clamped up. Writes are best-effort; a failed
/// telemetry write never fails the job.
pub struct ProgressReporter {
    jobs: JobsRepo,
    last: Mutex<HashMap<JobId, u8>>,
}

impl ProgressReporter {
    pub fn new(jobs: JobsRepo) -> Self {
        Self {
            jobs,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Forget a job's progress floor. Called at attempt start so a retried
    /// job can report from 0 again, and at attempt end to bound the map.
    pub async fn reset(&self, job_id: &JobId) {
        self.last.lock().await.remove(job_id);
    }

    /// Record progress (0-100) with an optional human-readable message.
    pub async fn update(&self, job_id: &JobId, percent: u8, message: Option<&str>) {
        let percent = {
            let mut last = self.last.lock().await;
            let floor = last.entry(job_id.clone()).or_insert(0);
            let clamped = percent.min(100).max(*floor);
            *floor = clamped;
            clamped
        };

        let output = message.map(|m| serde_json::json!({ "progress_message": m }));
        let result = self
            .jobs
            .update_status(
                job_id,
                JobStatus::Running,
                StatusUpdate {
                    progress: Some(percent),
                    output: output.as_ref(),
                    ..Default::default()
                },
            )
            .await;

        match result {
            Ok(_) => debug!(job_id = %job_id, percent, message, "progress"),
            Err(e) => warn!(job_id = %job_id, "progress update failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelkit_models::JobType;
    use reelkit_store::Store;
    use serde_json::json;

    #[tokio::test]
    async fn progress_is_monotonic_within_an_attempt() {
        let store = Store::open_in_memory().await.unwrap();
        let jobs = JobsRepo::new(store);
        let job = jobs
            .create(JobType::Download, None, None, &json!({}), 0, None)
            .await
            .unwrap();
        jobs.update_status(&job.id, JobStatus::Running, StatusUpdate::default())
            .await
            .unwrap();

        let reporter = ProgressReporter::new(jobs.clone());
        reporter.update(&job.id, 40, Some("downloading")).await;
        reporter.update(&job.id, 25, None).await; // stale, clamped up

        let row = jobs.by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(row.progress, 40);
        assert_eq!(row.output_data["progress_message"], "downloading");

        // New attempt: floor resets.
        reporter.reset(&job.id).await;
        reporter.update(&job.id, 10, None).await;
        let row = jobs.by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(row.progress, 10);
    }
}
