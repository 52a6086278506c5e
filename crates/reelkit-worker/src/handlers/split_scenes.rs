//! Scene-detect-and-split pipeline.

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::{cut, probe, scenes};
use reelkit_models::{EncodingConfig, Job, NewVideo};

use crate::context::HandlerContext;
use crate::error::HandlerResult;
use crate::handlers::{file_size, require_video, JobHandler};
use crate::logging::JobLogger;

/// Detects scene boundaries and cuts one clip per scene.
///
/// No detected boundaries is a success with `count = 0`. Progress after
/// detection tracks the fraction of clips completed.
pub struct SplitScenesHandler;

#[async_trait]
impl JobHandler for SplitScenesHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "split_scenes");

        let config = scenes::SceneDetectorConfig {
            min_scene_len: job.input_f64("min_scene_len").unwrap_or(2.0),
            threshold: job.input_f64("threshold").unwrap_or(3.0),
        };

        let video = require_video(ctx, job).await?;
        let video_path = ctx.dirs.require_video(&video.filename)?;
        let info = probe::probe_video(&video_path).await?;

        log.start(&format!("splitting {} by scenes", video.filename));
        ctx.progress(job, 10, "Detecting scenes...").await;

        let spans = scenes::detect_scenes(&video_path, info.duration, &config).await?;
        if spans.is_empty() {
            log.completion("no scenes detected");
            return Ok(json!({ "video_ids": [], "count": 0 }));
        }

        let encoding = EncodingConfig::quality();
        let runner = ctx.encoder();
        let stem = video.file_stem().to_string();
        let total = spans.len();
        let mut video_ids = Vec::with_capacity(total);

        for (i, (start, end)) in spans.iter().enumerate() {
            ctx.check_cancelled(job).await?;

            let clip_name = format!("{stem}_clip_{}.mp4", i + 1);
            let clip_path = ctx.dirs.processed.join(&clip_name);
            cut::cut_segment(&video_path, &clip_path, *start, *end, &encoding, &runner, |_| {})
                .await?;

            let clip = ctx
                .videos
                .create(
                    &video.project_id,
                    NewVideo::new(format!("Clip {}", i + 1), clip_name)
                        .as_clip_of(video.id.clone())
                        .with_size_bytes(file_size(&clip_path)),
                )
                .await?;
            video_ids.push(clip.id);

            let percent = 10 + (((i + 1) * 85) / total) as u8;
            ctx.progress(job, percent, &format!("Cut clip {}/{total}", i + 1))
                .await;
        }

        log.completion(&format!("created {total} clips"));
        Ok(json!({ "video_ids": video_ids, "count": total }))
    }
}
