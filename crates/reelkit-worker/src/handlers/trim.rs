//! Manual trim pipeline.

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::cut;
use reelkit_models::{EncodingConfig, Job, NewVideo};

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{file_size, require_video, JobHandler};
use crate::logging::JobLogger;

/// Cuts `[start_time, end_time)` into a new clip pointing back at the
/// source.
pub struct TrimHandler;

#[async_trait]
impl JobHandler for TrimHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "trim");

        let start = job
            .input_f64("start_time")
            .ok_or_else(|| HandlerError::validation("start_time is required"))?;
        let end = job
            .input_f64("end_time")
            .ok_or_else(|| HandlerError::validation("end_time is required"))?;
        if end <= start {
            return Err(HandlerError::validation("end_time must be after start_time"));
        }
        let title = job
            .input_str("title")
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Trimmed Video")
            .to_string();

        let video = require_video(ctx, job).await?;
        let video_path = ctx.dirs.require_video(&video.filename)?;

        let trimmed_name = ctx.dirs.fresh_trim_name();
        let output_path = ctx.dirs.processed.join(&trimmed_name);

        log.start(&format!(
            "trimming {} [{start:.3}, {end:.3})",
            video.filename
        ));
        ctx.progress(job, 10, "Trimming video...").await;

        cut::cut_segment(
            &video_path,
            &output_path,
            start,
            end,
            &EncodingConfig::quality(),
            &ctx.encoder(),
            |_| {},
        )
        .await?;

        ctx.progress(job, 90, "Creating database entry...").await;

        let trimmed = ctx
            .videos
            .create(
                &video.project_id,
                NewVideo::new(title, trimmed_name.clone())
                    .as_clip_of(video.id.clone())
                    .with_size_bytes(file_size(&output_path)),
            )
            .await?;

        log.completion(&format!("registered clip {}", trimmed.id));
        Ok(json!({ "video_id": trimmed.id, "filename": trimmed_name }))
    }
}
