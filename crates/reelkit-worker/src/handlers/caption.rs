//! Transcribe-to-subtitles pipeline.

use async_trait::async_trait;
use serde_json::json;

use reelkit_media::{subtitles, transcribe::ModelSize};
use reelkit_models::{CaptionFormat, Job};

use crate::context::HandlerContext;
use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{require_video, JobHandler};
use crate::logging::JobLogger;

/// Transcribes a video's audio and writes an SRT caption.
/// Progress: 10 model load, 20-80 transcription, 80-100 write/register.
pub struct CaptionHandler;

#[async_trait]
impl JobHandler for CaptionHandler {
    async fn handle(&self, job: &Job, ctx: &HandlerContext) -> HandlerResult<serde_json::Value> {
        let log = JobLogger::new(&job.id, "caption");

        let model_size: ModelSize = job
            .input_str("model_size")
            .unwrap_or("tiny")
            .parse()
            .map_err(HandlerError::Validation)?;
        let word_level = job.input_bool("word_level").unwrap_or(false);

        let video = require_video(ctx, job).await?;
        let video_path = ctx.dirs.require_video(&video.filename)?;

        log.start(&format!(
            "transcribing {} with {model_size} model",
            video.filename
        ));
        ctx.progress(job, 10, "Loading transcription model...").await;
        ctx.progress(job, 20, "Transcribing audio...").await;

        let segments = ctx
            .transcriber
            .transcribe(&video_path, model_size, word_level)
            .await?;

        ctx.check_cancelled(job).await?;
        ctx.progress(job, 80, "Writing caption file...").await;

        let caption_filename = format!("{}.srt", video.file_stem());
        let caption_path = ctx.dirs.caption_path(&caption_filename);
        let cues = subtitles::write_srt(&segments, &caption_path, word_level)
            .map_err(HandlerError::from)?;

        let caption = ctx
            .captions
            .create(&video.id, &caption_filename, "en", CaptionFormat::Srt, None)
            .await?;

        log.completion(&format!("wrote {cues} cues to {caption_filename}"));
        Ok(json!({ "caption_id": caption.id, "filename": caption_filename }))
    }
}
