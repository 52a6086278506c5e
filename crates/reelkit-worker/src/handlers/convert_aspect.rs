//! Re-render an existing video into the canonical 9:16 form.

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::{convert, probe};
use reelkit_models::{Job, NewVideo};

use crate::context::HandlerContext;
use crate::error::HandlerResult;
use crate::handlers::{file_size, progress_forwarder, require_video, JobHandler};
use crate::logging::JobLogger;

/// Produces a vertical sibling of an already-registered video.
pub struct ConvertAspectHandler;

#[async_trait]
impl JobHandler for ConvertAspectHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "convert_aspect");

        let video = require_video(ctx, job).await?;
        let video_path = ctx.dirs.require_video(&video.filename)?;

        let output_name = format!("vertical_{}", video.filename);
        let output_path = ctx.dirs.processed.join(&output_name);

        log.start(&format!("converting {} to 9:16", video.filename));
        ctx.progress(job, 20, "Detecting dimensions...").await;

        let duration_ms = (probe::probe_video(&video_path).await?.duration * 1000.0) as i64;
        ctx.progress(job, 40, "Converting to vertical...").await;

        let runner = ctx.encoder();
        let result = {
            let (tx, forward) = progress_forwarder(ctx.reporter.clone(), job.id.clone());
            let result =
                convert::convert_to_vertical(&video_path, &output_path, &runner, move |p| {
                    let percent = 40 + (p.percentage(duration_ms) * 0.5) as u8;
                    let _ = tx.send(percent.min(90));
                })
                .await;
            let _ = forward.await;
            result
        };
        result?;

        let info = probe::probe_video(&output_path).await.ok();
        let vertical = ctx
            .videos
            .create(
                &video.project_id,
                NewVideo {
                    title: format!("Vertical - {}", video.title),
                    filename: output_name.clone(),
                    source_url: None,
                    duration: info.as_ref().map(|i| i.duration),
                    width: info.as_ref().map(|i| i.width),
                    height: info.as_ref().map(|i| i.height),
                    size_bytes: file_size(&output_path),
                    is_clip: true,
                    parent_video_id: Some(video.id.clone()),
                },
            )
            .await?;

        log.completion(&format!("registered vertical video {}", vertical.id));
        Ok(json!({ "video_id": vertical.id, "filename": output_name }))
    }
}
