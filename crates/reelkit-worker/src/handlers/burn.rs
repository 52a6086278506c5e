//! Burn-subtitles-into-video pipeline.

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::subtitles;
use reelkit_models::{CaptionId, CaptionStyle, Job, NewVideo};

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{file_size, require_video, JobHandler};
use crate::logging::JobLogger;

/// Renders a caption file into the video frames.
///
/// Uses the named caption, or the newest caption of the video. The output
/// gets a fresh filename so stale browser caches never serve the pre-burn
/// bytes.
pub struct BurnHandler;

#[async_trait]
impl JobHandler for BurnHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "burn");

        let video = require_video(ctx, job).await?;
        let video_path = ctx.dirs.require_video(&video.filename)?;

        let caption = match job.input_str("caption_id") {
            Some(id) => ctx
                .captions
                .by_id(&CaptionId::from_string(id))
                .await?
                .ok_or_else(|| HandlerError::not_found(format!("caption {id}")))?,
            None => ctx
                .captions
                .by_video(&video.id)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    HandlerError::not_found(format!("no caption for video {}", video.id))
                })?,
        };

        let caption_path = ctx.dirs.caption_path(&caption.filename);
        if !caption_path.is_file() {
            return Err(HandlerError::not_found(format!(
                "caption file {}",
                caption.filename
            )));
        }

        let style: CaptionStyle = match job.input_data.get("style") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| HandlerError::validation(format!("bad style: {e}")))?,
            None => CaptionStyle::default(),
        };

        let burned_name = ctx.dirs.fresh_burned_name(&video.filename);
        let output_path = ctx.dirs.processed.join(&burned_name);

        log.start(&format!(
            "burning caption {} into {}",
            caption.filename, video.filename
        ));
        ctx.progress(job, 10, "Burning captions...").await;

        subtitles::burn_captions(&video_path, &caption_path, &output_path, &style, &ctx.encoder())
            .await?;

        ctx.progress(job, 90, "Creating database entry...").await;

        let burned = ctx
            .videos
            .create(
                &video.project_id,
                NewVideo {
                    title: format!("{} (Captioned)", video.title),
                    filename: burned_name.clone(),
                    source_url: None,
                    duration: video.duration,
                    width: video.width,
                    height: video.height,
                    size_bytes: file_size(&output_path),
                    is_clip: video.is_clip,
                    parent_video_id: Some(video.id.clone()),
                },
            )
            .await?;

        log.completion(&format!("registered burned video {}", burned.id));
        Ok(json!({ "video_id": burned.id, "filename": burned_name }))
    }
}
