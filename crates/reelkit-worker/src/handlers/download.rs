//! Fetch-from-URL pipeline.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::{convert, download, probe};
use reelkit_models::{Job, NewVideo};

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{file_size, progress_forwarder, require_project_id, JobHandler};
use crate::logging::JobLogger;
use crate::retry::{retry_with, RetryPolicy};

/// Downloads a video, converts it to the canonical 9:16 form and registers
/// it. Progress: 0-50 download, 60-95 convert, 95-100 registration.
pub struct DownloadHandler;

#[async_trait]
impl JobHandler for DownloadHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "download");

        let url = job
            .input_str("url")
            .ok_or_else(|| HandlerError::validation("url is required"))?
            .to_string();
        let project_id = require_project_id(job)?.clone();
        let resolution_label = job.input_str("resolution").unwrap_or("720").to_string();
        let resolution: download::Resolution = resolution_label
            .parse()
            .map_err(HandlerError::Validation)?;
        let proxy = match job.input_str("proxy") {
            Some(p) => Some(p.to_string()),
            None => ctx.proxy().await,
        };

        let title = match job.input_str("title") {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => download::extract_title(&url, proxy.as_deref()).await,
        };
        log.start(&format!("fetching {url}"));

        let (raw_name, processed_name) = ctx.dirs.fresh_download_names();
        let raw_path = ctx.dirs.uploads.join(&raw_name);
        let processed_path = ctx.dirs.uploads.join(&processed_name);

        ctx.progress(job, 5, &format!("Downloading {resolution_label}p format..."))
            .await;

        let policy = RetryPolicy::new("download", 3, Duration::from_secs(2));
        let fetch_result = retry_with(&policy, |e: &HandlerError| e.is_retryable(), || {
            let (tx, forward) = progress_forwarder(ctx.reporter.clone(), job.id.clone());
            let url = url.clone();
            let raw_path = raw_path.clone();
            let proxy = proxy.clone();
            async move {
                let result = download::fetch_video(
                    &url,
                    &raw_path,
                    resolution,
                    proxy.as_deref(),
                    ctx.config.download_timeout,
                    move |downloaded, total| {
                        if let Some(total) = total.filter(|t| *t > 0) {
                            let percent = ((downloaded * 50) / total).min(50) as u8;
                            let _ = tx.send(percent);
                        }
                    },
                )
                .await;
                let _ = forward.await;
                result.map_err(HandlerError::from)
            }
        })
        .await;
        fetch_result?;

        ctx.check_cancelled(job).await?;
        ctx.progress(job, 60, "Converting to vertical format...").await;

        let duration_ms = (probe::probe_video(&raw_path).await?.duration * 1000.0) as i64;
        let runner = ctx.encoder();
        let convert_result = {
            let (tx, forward) = progress_forwarder(ctx.reporter.clone(), job.id.clone());
            let result = convert::convert_to_vertical(
                &raw_path,
                &processed_path,
                &runner,
                move |p| {
                    let percent = 60 + (p.percentage(duration_ms) * 0.35) as u8;
                    let _ = tx.send(percent.min(95));
                },
            )
            .await;
            let _ = forward.await;
            result
        };
        convert_result?;

        if raw_path.exists() {
            let _ = tokio::fs::remove_file(&raw_path).await;
        }

        ctx.progress(job, 95, "Finalizing...").await;

        let info = probe::probe_video(&processed_path).await.ok();
        let video = ctx
            .videos
            .create(
                &project_id,
                NewVideo {
                    title,
                    filename: processed_name.clone(),
                    source_url: Some(url),
                    duration: info.as_ref().map(|i| i.duration),
                    width: info.as_ref().map(|i| i.width),
                    height: info.as_ref().map(|i| i.height),
                    size_bytes: file_size(&processed_path),
                    is_clip: false,
                    parent_video_id: None,
                },
            )
            .await?;

        log.completion(&format!("registered video {}", video.id));
        Ok(json!({ "video_id": video.id, "filename": processed_name }))
    }
}
