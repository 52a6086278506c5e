//! Job handlers, one per pipeline.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use reelkit_models::{Job, JobType, ProjectId, Video};
use reelkit_queue::ProgressReporter;

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};

pub mod browser_import;
pub mod burn;
pub mod caption;
pub mod convert_aspect;
pub mod download;
pub mod split_fixed;
pub mod split_scenes;
pub mod trim;
pub mod upload;

pub use browser_import::BrowserImportHandler;
pub use burn::BurnHandler;
pub use caption::CaptionHandler;
pub use convert_aspect::ConvertAspectHandler;
pub use download::DownloadHandler;
pub use split_fixed::SplitFixedHandler;
pub use split_scenes::SplitScenesHandler;
pub use trim::TrimHandler;
pub use upload::UploadHandler;

/// A callable bound to a job type that performs the actual work.
///
/// Handlers are idempotent within an attempt: output filenames are fresh
/// UUIDs, and no Video/Caption row is registered unless the artifact was
/// produced. The returned object is merged into the job's `output_data`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value>;
}

/// The full handler registry.
pub fn default_registry() -> HashMap<JobType, Arc<dyn JobHandler>> {
    let mut handlers: HashMap<JobType, Arc<dyn JobHandler>> = HashMap::new();
    handlers.insert(JobType::Download, Arc::new(DownloadHandler));
    handlers.insert(JobType::Upload, Arc::new(UploadHandler));
    handlers.insert(JobType::Caption, Arc::new(CaptionHandler));
    handlers.insert(JobType::Burn, Arc::new(BurnHandler));
    handlers.insert(JobType::SplitScenes, Arc::new(SplitScenesHandler));
    handlers.insert(JobType::SplitFixed, Arc::new(SplitFixedHandler));
    handlers.insert(JobType::Trim, Arc::new(TrimHandler));
    handlers.insert(JobType::ConvertAspect, Arc::new(ConvertAspectHandler));
    handlers.insert(JobType::BrowserImport, Arc::new(BrowserImportHandler));
    handlers
}

/// The project a job is scoped to, or a validation error.
pub(crate) fn require_project_id(job: &Job) -> HandlerResult<&ProjectId> {
    job.project_id
        .as_ref()
        .ok_or_else(|| HandlerError::validation("project_id is required"))
}

/// The video a job targets, or an error.
pub(crate) async fn require_video(ctx: &HandlerContext, job: &Job) -> HandlerResult<Video> {
    let video_id = job
        .video_id
        .as_ref()
        .ok_or_else(|| HandlerError::validation("video_id is required"))?;
    ctx.videos
        .by_id(video_id)
        .await?
        .ok_or_else(|| HandlerError::not_found(format!("video {video_id}")))
}

pub(crate) fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

/// Bridge synchronous tool progress callbacks into the async reporter.
///
/// The returned sender accepts absolute percentages; stale values are
/// dropped. Drop every sender clone, then await the handle to flush.
pub(crate) fn progress_forwarder(
    reporter: Arc<ProgressReporter>,
    job_id: reelkit_models::JobId,
) -> (mpsc::UnboundedSender<u8>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<u8>();
    let handle = tokio::spawn(async move {
        let mut last = 0u8;
        while let Some(percent) = rx.recv().await {
            if percent > last {
                last = percent;
                reporter.update(&job_id, percent, None).await;
            }
        }
    });
    (tx, handle)
}
