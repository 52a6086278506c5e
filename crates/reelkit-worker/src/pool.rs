//! Fixed-size worker pool.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use reelkit_models::{Job, JobId, JobStatus, JobType};
use reelkit_queue::JobQueue;
use reelkit_store::StatusUpdate;

use crate::context::HandlerContext;
use crate::error::HandlerError;
use crate::handlers::JobHandler;

/// Snapshot of one worker for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WorkerState {
    pub worker_id: usize,
    pub current_job_id: Option<JobId>,
}

/// A fixed set of long-lived workers pulling jobs from the queue and
/// dispatching them to handlers by type.
pub struct WorkerPool {
    queue: Arc<JobQueue>,
    ctx: Arc<HandlerContext>,
    handlers: Arc<HashMap<JobType, Arc<dyn JobHandler>>>,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    states: Arc<Vec<Mutex<Option<JobId>>>>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<JobQueue>,
        ctx: Arc<HandlerContext>,
        handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    ) -> Self {
        let num_workers = ctx.config.num_workers;
        let (shutdown, _) = watch::channel(false);
        Self {
            queue,
            ctx,
            handlers: Arc::new(handlers),
            shutdown,
            workers: Mutex::new(Vec::new()),
            states: Arc::new((0..num_workers).map(|_| Mutex::new(None)).collect()),
        }
    }

    /// Spawn the workers.
    pub fn start(&self) {
        let mut workers = self.workers.lock().expect("worker list poisoned");
        if !workers.is_empty() {
            warn!("worker pool already started");
            return;
        }
        let num_workers = self.ctx.config.num_workers;
        info!("starting {num_workers} workers");
        for worker_id in 0..num_workers {
            let queue = Arc::clone(&self.queue);
            let ctx = Arc::clone(&self.ctx);
            let handlers = Arc::clone(&self.handlers);
            let states = Arc::clone(&self.states);
            let mut shutdown_rx = self.shutdown.subscribe();

            workers.push(tokio::spawn(async move {
                info!("worker {worker_id} started");
                loop {
                    if *shutdown_rx.borrow_and_update() {
                        break;
                    }
                    // Bounded pop so the stop signal is observed promptly.
                    let Some(job_id) = queue.pop(ctx.config.poll_interval).await else {
                        continue;
                    };
                    if let Some(slot) = states.get(worker_id) {
                        *slot.lock().expect("state poisoned") = Some(job_id.clone());
                    }
                    process_one(&ctx, &queue, &handlers, &job_id, worker_id).await;
                    if let Some(slot) = states.get(worker_id) {
                        *slot.lock().expect("state poisoned") = None;
                    }
                }
                info!("worker {worker_id} stopped");
            }));
        }
    }

    /// Signal workers to stop; optionally wait for them to drain.
    pub async fn stop(&self, wait: bool) {
        let _ = self.shutdown.send(true);
        if !wait {
            return;
        }
        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.workers.lock().expect("worker list poisoned"));
        let timeout = self.ctx.config.shutdown_timeout;
        for handle in handles {
            if tokio::time::timeout(timeout, handle).await.is_err() {
                warn!("worker did not stop within {timeout:?}");
            }
        }
        info!("worker pool stopped");
    }

    /// Per-worker current-job snapshot.
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.states
            .iter()
            .enumerate()
            .map(|(worker_id, slot)| WorkerState {
                worker_id,
                current_job_id: slot.lock().expect("state poisoned").clone(),
            })
            .collect()
    }
}

/// One full worker step: reload, guard, run the handler, map the outcome.
async fn process_one(
    ctx: &Arc<HandlerContext>,
    queue: &Arc<JobQueue>,
    handlers: &HashMap<JobType, Arc<dyn JobHandler>>,
    job_id: &JobId,
    worker_id: usize,
) {
    let job = match ctx.jobs.by_id(job_id).await {
        Ok(Some(job)) => job,
        Ok(None) => {
            warn!(job_id = %job_id, "popped job no longer exists");
            return;
        }
        Err(e) => {
            error!(job_id = %job_id, "could not load job: {e}");
            return;
        }
    };

    // Cancelled (or otherwise no-longer-pending) ids are dropped on pop.
    if job.status != JobStatus::Pending {
        info!(job_id = %job_id, status = %job.status, "dropping non-pending job");
        return;
    }

    let running = ctx
        .jobs
        .update_status(
            &job.id,
            JobStatus::Running,
            StatusUpdate {
                progress: Some(0),
                ..Default::default()
            },
        )
        .await;
    let job = match running {
        Ok(Some(job)) if job.status == JobStatus::Running => job,
        Ok(_) => {
            // A cancel won the race; the guard refused the transition.
            info!(job_id = %job_id, "job cancelled before start");
            return;
        }
        Err(e) => {
            error!(job_id = %job_id, "could not mark job running: {e}");
            return;
        }
    };
    ctx.reporter.reset(&job.id).await;

    let Some(handler) = handlers.get(&job.job_type) else {
        let message = format!("no handler registered for job type: {}", job.job_type);
        error!(job_id = %job.id, "{message}");
        finalize_failed(ctx, &job.id, &message).await;
        return;
    };

    info!(job_id = %job.id, job_type = %job.job_type, worker_id, "processing job");
    metrics::counter!("jobs_started").increment(1);
    let started = std::time::Instant::now();

    match handler.handle(&job, ctx).await {
        Ok(output) => {
            let result = ctx
                .jobs
                .update_status(
                    &job.id,
                    JobStatus::Completed,
                    StatusUpdate {
                        progress: Some(100),
                        output: Some(&output),
                        ..Default::default()
                    },
                )
                .await;
            if let Err(e) = result {
                error!(job_id = %job.id, "could not mark job completed: {e}");
            }
            metrics::counter!("jobs_completed").increment(1);
            info!(
                job_id = %job.id,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "job completed"
            );
        }
        Err(HandlerError::Cancelled) => {
            // The row was flipped by the cancel API; make sure it is
            // terminal in case the flag raced the handler's observation.
            let _ = ctx.jobs.cancel(&job.id).await;
            metrics::counter!("jobs_cancelled").increment(1);
            info!(job_id = %job.id, "job cancelled mid-flight");
        }
        Err(e) => {
            let message = e.job_message();
            error!(job_id = %job.id, "job failed: {message}");
            finalize_failed(ctx, &job.id, &message).await;
            metrics::counter!("jobs_failed").increment(1);

            if e.is_retryable() {
                retry_and_requeue(ctx, queue, &job).await;
            }
        }
    }
    ctx.reporter.reset(&job.id).await;
}

async fn finalize_failed(ctx: &HandlerContext, job_id: &JobId, message: &str) {
    let result = ctx
        .jobs
        .update_status(
            job_id,
            JobStatus::Failed,
            StatusUpdate {
                error_message: Some(message),
                ..Default::default()
            },
        )
        .await;
    if let Err(e) = result {
        error!(job_id = %job_id, "could not mark job failed: {e}");
    }
}

/// Consume a retry slot and, when granted, push the job straight back onto
/// the in-memory queue so the retry runs without waiting for a restart.
async fn retry_and_requeue(ctx: &HandlerContext, queue: &Arc<JobQueue>, job: &Job) {
    match ctx.jobs.retry(&job.id).await {
        Ok(true) => match ctx.jobs.by_id(&job.id).await {
            Ok(Some(fresh)) => {
                info!(
                    job_id = %job.id,
                    attempt = fresh.retry_count,
                    max = fresh.max_retries,
                    "re-enqueued for retry"
                );
                queue.enqueue(&fresh).await;
            }
            Ok(None) => warn!(job_id = %job.id, "retried job disappeared"),
            Err(e) => error!(job_id = %job.id, "could not reload retried job: {e}"),
        },
        Ok(false) => {
            info!(job_id = %job.id, "retry budget exhausted, job stays failed");
        }
        Err(e) => error!(job_id = %job.id, "retry bookkeeping failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::error::HandlerResult;
    use async_trait::async_trait;
    use reelkit_media::MediaDirs;
    use reelkit_store::Store;
    use serde_json::json;
    use std::time::Duration;

    struct OkHandler;

    #[async_trait]
    impl JobHandler for OkHandler {
        async fn handle(
            &self,
            _job: &Job,
            _ctx: &HandlerContext,
        ) -> HandlerResult<serde_json::Value> {
            Ok(json!({"filename": "out.mp4"}))
        }
    }

    struct FlakyHandler;

    #[async_trait]
    impl JobHandler for FlakyHandler {
        async fn handle(
            &self,
            _job: &Job,
            _ctx: &HandlerContext,
        ) -> HandlerResult<serde_json::Value> {
            Err(HandlerError::TransientIo("connection reset".into()))
        }
    }

    struct BadInputHandler;

    #[async_trait]
    impl JobHandler for BadInputHandler {
        async fn handle(
            &self,
            _job: &Job,
            _ctx: &HandlerContext,
        ) -> HandlerResult<serde_json::Value> {
            Err(HandlerError::validation("missing url"))
        }
    }

    async fn fixture(
        handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    ) -> (Arc<JobQueue>, Arc<HandlerContext>, WorkerPool) {
        let store = Store::open_in_memory().await.unwrap();
        let dirs = MediaDirs::under(tempfile::tempdir().unwrap().into_path());
        dirs.ensure().unwrap();
        let config = WorkerConfig {
            num_workers: 2,
            poll_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let ctx = Arc::new(HandlerContext::new(store, dirs, config));
        let queue = Arc::new(JobQueue::new(ctx.jobs.clone()));
        queue.start().await.unwrap();
        let pool = WorkerPool::new(Arc::clone(&queue), Arc::clone(&ctx), handlers);
        (queue, ctx, pool)
    }

    async fn wait_for_status(
        ctx: &HandlerContext,
        id: &JobId,
        status: JobStatus,
    ) -> reelkit_models::Job {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = ctx.jobs.by_id(id).await.unwrap().unwrap();
                if job.status == status {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job never reached expected status")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn successful_job_completes_with_output() {
        let mut handlers: HashMap<JobType, Arc<dyn JobHandler>> = HashMap::new();
        handlers.insert(JobType::Trim, Arc::new(OkHandler));
        let (queue, ctx, pool) = fixture(handlers).await;
        pool.start();

        let job = queue
            .submit(JobType::Trim, None, None, &json!({}), 0)
            .await
            .unwrap();
        let done = wait_for_status(&ctx, &job.id, JobStatus::Completed).await;
        assert_eq!(done.progress, 100);
        assert_eq!(done.output_data["filename"], "out.mp4");
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());

        pool.stop(true).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn retryable_failure_cycles_until_budget_is_exhausted() {
        let mut handlers: HashMap<JobType, Arc<dyn JobHandler>> = HashMap::new();
        handlers.insert(JobType::Download, Arc::new(FlakyHandler));
        let (queue, ctx, pool) = fixture(handlers).await;
        pool.start();

        let job = ctx
            .jobs
            .create(JobType::Download, None, None, &json!({}), 0, Some(3))
            .await
            .unwrap();
        queue.enqueue(&job).await;

        // Re-enqueue happens inside the worker step, so the job drains its
        // whole budget without any external kick.
        let done = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let row = ctx.jobs.by_id(&job.id).await.unwrap().unwrap();
                if row.status == JobStatus::Failed && row.retry_count == row.max_retries {
                    return row;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job never exhausted its retry budget");

        assert_eq!(done.retry_count, 3);
        assert!(done.error_message.unwrap().contains("connection reset"));

        pool.stop(true).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn validation_failure_is_not_retried() {
        let mut handlers: HashMap<JobType, Arc<dyn JobHandler>> = HashMap::new();
        handlers.insert(JobType::Download, Arc::new(BadInputHandler));
        let (queue, ctx, pool) = fixture(handlers).await;
        pool.start();

        let job = queue
            .submit(JobType::Download, None, None, &json!({}), 0)
            .await
            .unwrap();
        let done = wait_for_status(&ctx, &job.id, JobStatus::Failed).await;
        assert_eq!(done.retry_count, 0);

        pool.stop(true).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unknown_job_type_fails_without_retry() {
        let (queue, ctx, pool) = fixture(HashMap::new()).await;
        pool.start();

        let job = queue
            .submit(JobType::Burn, None, None, &json!({}), 0)
            .await
            .unwrap();
        let done = wait_for_status(&ctx, &job.id, JobStatus::Failed).await;
        assert!(done.error_message.unwrap().contains("no handler registered"));
        assert_eq!(done.retry_count, 0);

        pool.stop(true).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_before_pop_is_dropped() {
        let mut handlers: HashMap<JobType, Arc<dyn JobHandler>> = HashMap::new();
        handlers.insert(JobType::Trim, Arc::new(OkHandler));
        let (queue, ctx, pool) = fixture(handlers).await;

        // Cancel while no worker is running, then start the pool.
        let job = queue
            .submit(JobType::Trim, None, None, &json!({}), 0)
            .await
            .unwrap();
        queue.cancel(&job.id).await.unwrap();
        pool.start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let row = ctx.jobs.by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(row.status, JobStatus::Cancelled);
        assert!(row.started_at.is_none());

        pool.stop(true).await;
    }
}
