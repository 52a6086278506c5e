//! Priority queue fronting the durable pending set.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{info, warn};

use reelkit_models::{Job, JobId, JobStatus, JobType, ProjectId, VideoId};
use reelkit_store::{JobsRepo, StatusUpdate};

use crate::error::{QueueError, QueueResult};

/// Heap entry: higher priority first, FIFO within a tier.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    priority: i64,
    created_at: DateTime<Utc>,
    job_id: JobId,
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap pops the greatest entry: compare priority ascending,
        // then invert created_at so older entries sort greater.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct QueueInner {
    heap: BinaryHeap<QueueEntry>,
    started: bool,
}

/// Queue statistics for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStats {
    pub depth: usize,
    pub started: bool,
}

/// In-memory priority queue over the durable `jobs` table.
///
/// Admission is serialized through the store; the heap only ever holds ids
/// of rows that exist in `pending`. Workers re-read the row on pop, so a
/// cancelled id left in the heap is simply dropped.
pub struct JobQueue {
    jobs: JobsRepo,
    inner: Mutex<QueueInner>,
    notify: Notify,
}

impl JobQueue {
    pub fn new(jobs: JobsRepo) -> Self {
        Self {
            jobs,
            inner: Mutex::new(QueueInner::default()),
            notify: Notify::new(),
        }
    }

    pub fn jobs(&self) -> &JobsRepo {
        &self.jobs
    }

    /// Start the queue: sweep orphaned `running` rows, then rehydrate every
    /// `pending` row into the heap. This is the crash-recovery pathway.
    pub async fn start(&self) -> QueueResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.started {
            return Err(QueueError::AlreadyStarted);
        }

        // Rows left in `running` belonged to workers that no longer exist.
        // Budget permitting they go back to pending (consuming a retry
        // slot), otherwise they are finalized as failed.
        let orphans = self.jobs.running_jobs().await?;
        for job in &orphans {
            if self.jobs.retry(&job.id).await? {
                warn!(job_id = %job.id, "orphaned running job returned to pending");
            } else {
                self.jobs
                    .update_status(
                        &job.id,
                        JobStatus::Failed,
                        StatusUpdate {
                            error_message: Some("worker lost: job was running at shutdown"),
                            ..Default::default()
                        },
                    )
                    .await?;
                warn!(job_id = %job.id, "orphaned running job failed (retry budget exhausted)");
            }
        }

        let pending = self.jobs.pending_jobs(None).await?;
        for job in &pending {
            inner.heap.push(QueueEntry {
                priority: job.priority,
                created_at: job.created_at,
                job_id: job.id.clone(),
            });
        }
        inner.started = true;
        metrics::gauge!("queue_depth").set(inner.heap.len() as f64);
        info!(
            rehydrated = pending.len(),
            orphans = orphans.len(),
            "job queue started"
        );
        drop(inner);
        self.notify.notify_waiters();
        Ok(())
    }

    /// Create the pending row and enqueue it.
    pub async fn submit(
        &self,
        job_type: JobType,
        project_id: Option<&ProjectId>,
        video_id: Option<&VideoId>,
        input: &serde_json::Value,
        priority: i64,
    ) -> QueueResult<Job> {
        let job = self
            .jobs
            .create(job_type, project_id, video_id, input, priority, None)
            .await?;
        self.enqueue(&job).await;
        Ok(job)
    }

    /// Push an existing pending job onto the heap (used for retries).
    pub async fn enqueue(&self, job: &Job) {
        let mut inner = self.inner.lock().await;
        inner.heap.push(QueueEntry {
            priority: job.priority,
            created_at: job.created_at,
            job_id: job.id.clone(),
        });
        metrics::gauge!("queue_depth").set(inner.heap.len() as f64);
        drop(inner);
        self.notify.notify_one();
    }

    /// Pop the highest-priority job id, waiting up to `timeout`.
    pub async fn pop(&self, timeout: Duration) -> Option<JobId> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            {
                let mut inner = self.inner.lock().await;
                if let Some(entry) = inner.heap.pop() {
                    metrics::gauge!("queue_depth").set(inner.heap.len() as f64);
                    return Some(entry.job_id);
                }
            }
            tokio::pin!(notified);
            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => return None,
            }
        }
    }

    /// Cancel a job. The heap entry, if any, is left in place; workers
    /// observe the cancelled status on pop and drop it.
    pub async fn cancel(&self, id: &JobId) -> QueueResult<bool> {
        Ok(self.jobs.cancel(id).await?)
    }

    pub async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().await;
        QueueStats {
            depth: inner.heap.len(),
            started: inner.started,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelkit_store::Store;
    use serde_json::json;

    async fn queue() -> JobQueue {
        let store = Store::open_in_memory().await.unwrap();
        JobQueue::new(JobsRepo::new(store))
    }

    #[tokio::test]
    async fn priority_order_with_fifo_tiebreak() {
        let queue = queue().await;
        queue.start().await.unwrap();

        let a = queue
            .submit(JobType::Caption, None, None, &json!({}), 0)
            .await
            .unwrap();
        let b = queue
            .submit(JobType::Caption, None, None, &json!({}), 5)
            .await
            .unwrap();
        let c = queue
            .submit(JobType::Caption, None, None, &json!({}), 0)
            .await
            .unwrap();

        let timeout = Duration::from_millis(50);
        assert_eq!(queue.pop(timeout).await, Some(b.id));
        assert_eq!(queue.pop(timeout).await, Some(a.id));
        assert_eq!(queue.pop(timeout).await, Some(c.id));
        assert_eq!(queue.pop(timeout).await, None);
    }

    #[tokio::test]
    async fn rehydration_restores_pending_in_priority_order() {
        let store = Store::open_in_memory().await.unwrap();
        let jobs = JobsRepo::new(store.clone());

        // Rows created before the queue process "restarts".
        let p0 = jobs
            .create(JobType::Caption, None, None, &json!({}), 0, None)
            .await
            .unwrap();
        let p10 = jobs
            .create(JobType::Caption, None, None, &json!({}), 10, None)
            .await
            .unwrap();
        let p5 = jobs
            .create(JobType::Caption, None, None, &json!({}), 5, None)
            .await
            .unwrap();

        let queue = JobQueue::new(jobs);
        queue.start().await.unwrap();
        assert_eq!(queue.stats().await.depth, 3);

        let timeout = Duration::from_millis(50);
        assert_eq!(queue.pop(timeout).await, Some(p10.id));
        assert_eq!(queue.pop(timeout).await, Some(p5.id));
        assert_eq!(queue.pop(timeout).await, Some(p0.id));
    }

    #[tokio::test]
    async fn orphaned_running_rows_are_swept_on_start() {
        let store = Store::open_in_memory().await.unwrap();
        let jobs = JobsRepo::new(store.clone());

        let with_budget = jobs
            .create(JobType::Burn, None, None, &json!({}), 0, None)
            .await
            .unwrap();
        jobs.update_status(&with_budget.id, JobStatus::Running, StatusUpdate::default())
            .await
            .unwrap();

        let exhausted = jobs
            .create(JobType::Burn, None, None, &json!({}), 0, Some(0))
            .await
            .unwrap();
        jobs.update_status(&exhausted.id, JobStatus::Running, StatusUpdate::default())
            .await
            .unwrap();

        let queue = JobQueue::new(jobs.clone());
        queue.start().await.unwrap();

        let revived = jobs.by_id(&with_budget.id).await.unwrap().unwrap();
        assert_eq!(revived.status, JobStatus::Pending);
        assert_eq!(revived.retry_count, 1);

        let dead = jobs.by_id(&exhausted.id).await.unwrap().unwrap();
        assert_eq!(dead.status, JobStatus::Failed);
        assert!(dead.error_message.unwrap().contains("worker lost"));

        // Only the revived job is in the heap.
        assert_eq!(queue.stats().await.depth, 1);
        assert_eq!(
            queue.pop(Duration::from_millis(50)).await,
            Some(with_budget.id)
        );
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let queue = queue().await;
        queue.start().await.unwrap();
        assert!(matches!(
            queue.start().await,
            Err(QueueError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn cancelled_id_stays_in_heap_until_popped() {
        let queue = queue().await;
        queue.start().await.unwrap();

        let job = queue
            .submit(JobType::Trim, None, None, &json!({}), 0)
            .await
            .unwrap();
        assert!(queue.cancel(&job.id).await.unwrap());

        // The id still pops; the worker is responsible for dropping it.
        assert_eq!(queue.pop(Duration::from_millis(50)).await, Some(job.id));
    }
}
