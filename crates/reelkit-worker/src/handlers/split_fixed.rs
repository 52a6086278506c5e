//! Fixed-interval split pipeline.

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::{cut, probe};
use reelkit_models::{EncodingConfig, Job, NewVideo};

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{file_size, require_video, JobHandler};
use crate::logging::JobLogger;

/// Cuts the video into `ceil(duration / interval)` clips; the last clip is
/// clamped to the probed duration.
pub struct SplitFixedHandler;

#[async_trait]
impl JobHandler for SplitFixedHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "split_fixed");

        let interval = job.input_f64("interval").unwrap_or(30.0);
        if interval <= 0.0 {
            return Err(HandlerError::validation("interval must be positive"));
        }

        let video = require_video(ctx, job).await?;
        let video_path = ctx.dirs.require_video(&video.filename)?;

        ctx.progress(job, 10, "Probing duration...").await;
        let duration = probe::probe_video(&video_path).await?.duration;
        if duration <= 0.0 {
            return Err(HandlerError::validation("video has no measurable duration"));
        }

        let total = (duration / interval).ceil() as usize;
        log.start(&format!(
            "splitting {} into {total} x {interval}s clips",
            video.filename
        ));

        let encoding = EncodingConfig::quality();
        let runner = ctx.encoder();
        let stem = video.file_stem().to_string();
        let mut video_ids = Vec::with_capacity(total);

        for i in 0..total {
            ctx.check_cancelled(job).await?;

            let start = i as f64 * interval;
            let end = ((i + 1) as f64 * interval).min(duration);
            let clip_name = format!("{stem}_part_{}.mp4", i + 1);
            let clip_path = ctx.dirs.processed.join(&clip_name);

            cut::cut_segment(&video_path, &clip_path, start, end, &encoding, &runner, |_| {})
                .await?;

            let clip = ctx
                .videos
                .create(
                    &video.project_id,
                    NewVideo::new(format!("Part {}", i + 1), clip_name)
                        .as_clip_of(video.id.clone())
                        .with_size_bytes(file_size(&clip_path)),
                )
                .await?;
            video_ids.push(clip.id);

            let percent = 10 + (((i + 1) * 85) / total) as u8;
            ctx.progress(job, percent, &format!("Cut part {}/{total}", i + 1))
                .await;
        }

        log.completion(&format!("created {total} clips"));
        Ok(json!({ "video_ids": video_ids, "count": total }))
    }
}
