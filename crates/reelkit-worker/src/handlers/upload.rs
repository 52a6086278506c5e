//! Direct-upload pipeline.

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::convert;
use reelkit_models::{Job, NewVideo};

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{file_size, require_project_id, JobHandler};
use crate::logging::JobLogger;

/// Normalizes a pre-staged upload into the canonical 9:16 mp4 and
/// registers it. The HTTP layer has already placed the staged file in the
/// uploads directory.
pub struct UploadHandler;

#[async_trait]
impl JobHandler for UploadHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "upload");

        let staged_name = job
            .input_str("filename")
            .ok_or_else(|| HandlerError::validation("filename is required"))?;
        let project_id = require_project_id(job)?.clone();
        let title = job
            .input_str("title")
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Uploaded Video")
            .to_string();

        let staged_path = ctx.dirs.uploads.join(staged_name);
        if !staged_path.is_file() {
            return Err(HandlerError::not_found(format!(
                "staged upload {staged_name}"
            )));
        }

        let final_name = ctx.dirs.fresh_upload_name();
        let final_path = ctx.dirs.uploads.join(&final_name);

        log.start(&format!("importing {staged_name}"));
        ctx.progress(job, 30, "Importing video safely...").await;

        convert::safe_import(&staged_path, &final_path, &ctx.encoder()).await?;

        if staged_path.exists() && staged_path != final_path {
            let _ = tokio::fs::remove_file(&staged_path).await;
        }

        ctx.progress(job, 90, "Registering video...").await;

        let info = reelkit_media::probe_video(&final_path).await.ok();
        let video = ctx
            .videos
            .create(
                &project_id,
                NewVideo {
                    title,
                    filename: final_name.clone(),
                    source_url: None,
                    duration: info.as_ref().map(|i| i.duration),
                    width: info.as_ref().map(|i| i.width),
                    height: info.as_ref().map(|i| i.height),
                    size_bytes: file_size(&final_path),
                    is_clip: false,
                    parent_video_id: None,
                },
            )
            .await?;

        log.completion(&format!("registered video {}", video.id));
        Ok(json!({ "video_id": video.id, "filename": final_name }))
    }
}
