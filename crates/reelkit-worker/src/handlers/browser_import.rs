//! Import pipeline for files staged by the remote-browser subsystem.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::convert;
use reelkit_models::{Job, NewVideo};

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{file_size, require_project_id, JobHandler};
use crate::logging::JobLogger;

/// Imports a file already on disk: normalize into canonical form, drop the
/// stage file, register the video.
pub struct BrowserImportHandler;

#[async_trait]
impl JobHandler for BrowserImportHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "browser_import");

        let temp_path = PathBuf::from(
            job.input_str("temp_path")
                .ok_or_else(|| HandlerError::validation("temp_path is required"))?,
        );
        let original_name = job
            .input_str("original_name")
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Imported Video")
            .to_string();
        let project_id = require_project_id(job)?.clone();

        if !temp_path.is_file() {
            return Err(HandlerError::not_found(format!(
                "staged file {}",
                temp_path.display()
            )));
        }

        let final_name = ctx.dirs.fresh_upload_name();
        let final_path = ctx.dirs.uploads.join(&final_name);

        log.start(&format!("importing {}", temp_path.display()));
        ctx.progress(job, 20, "Normalizing video format...").await;

        convert::safe_import(&temp_path, &final_path, &ctx.encoder()).await?;

        if temp_path.exists() && temp_path != final_path {
            let _ = tokio::fs::remove_file(&temp_path).await;
        }

        ctx.progress(job, 90, "Registering video...").await;

        let info = reelkit_media::probe_video(&final_path).await.ok();
        let video = ctx
            .videos
            .create(
                &project_id,
                NewVideo {
                    title: original_name,
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
