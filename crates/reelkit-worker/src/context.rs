//! Shared handler context.

use std::sync::Arc;

use reelkit_media::{FfmpegRunner, MediaDirs, TranscriberCache};
use reelkit_models::{Job, JobStatus};
use reelkit_queue::ProgressReporter;
use reelkit_store::{CaptionsRepo, JobsRepo, ProjectsRepo, SettingsRepo, Store, VideosRepo};

use crate::config::WorkerConfig;
use crate::error::{HandlerError, HandlerResult};

/// Everything a handler needs: repositories, artifact directories, tool
/// adapters and progress telemetry. Constructed once at startup and shared
/// across workers.
pub struct HandlerContext {
    pub config: WorkerConfig,
    pub projects: ProjectsRepo,
    pub videos: VideosRepo,
    pub captions: CaptionsRepo,
    pub jobs: JobsRepo,
    pub settings: SettingsRepo,
    pub dirs: MediaDirs,
    pub transcriber: TranscriberCache,
    pub reporter: Arc<ProgressReporter>,
}

impl HandlerContext {
    pub fn new(store: Store, dirs: MediaDirs, config: WorkerConfig) -> Self {
        let jobs = JobsRepo::new(store.clone());
        Self {
            config,
            projects: ProjectsRepo::new(store.clone()),
            videos: VideosRepo::new(store.clone()),
            captions: CaptionsRepo::new(store.clone()),
            jobs: jobs.clone(),
            settings: SettingsRepo::new(store),
            dirs,
            transcriber: TranscriberCache::from_env(),
            reporter: Arc::new(ProgressReporter::new(jobs)),
        }
    }

    /// Encoder runner with the configured timeout.
    pub fn encoder(&self) -> FfmpegRunner {
        FfmpegRunner::new().with_timeout(self.config.encode_timeout.as_secs())
    }

    /// Report progress with a message.
    pub async fn progress(&self, job: &Job, percent: u8, message: &str) {
        self.reporter.update(&job.id, percent, Some(message)).await;
    }

    /// Observe the cancel flag between tool invocations.
    ///
    /// Cancellation does not preempt a running external process; handlers
    /// call this at step boundaries and bail out early.
    pub async fn check_cancelled(&self, job: &Job) -> HandlerResult<()> {
        match self.jobs.by_id(&job.id).await? {
            Some(row) if row.status == JobStatus::Cancelled => Err(HandlerError::Cancelled),
            _ => Ok(()),
        }
    }

    /// The global proxy setting, if configured.
    pub async fn proxy(&self) -> Option<String> {
        self.settings
            .get("proxy")
            .await
            .ok()
            .flatten()
            .and_then(|v| v.as_str().map(str::to_string))
    }
}
