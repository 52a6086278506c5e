//! Segment cutting.

use std::path::Path;
use tracing::info;

use reelkit_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Cut `[start, end)` out of `input` into `output`, re-encoding for
/// frame-accurate boundaries.
pub async fn cut_segment<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start: f64,
    end: f64,
    encoding: &EncodingConfig,
    runner: &FfmpegRunner,
    progress_callback: F,
) -> MediaResult<()>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    if !(end > start) {
        return Err(MediaError::InvalidTimestamp(format!(
            "end {end} must be after start {start}"
        )));
    }
    let input = input.as_ref();
    let output = output.as_ref();
    info!(
        "cutting {} [{start:.3}, {end:.3}) -> {}",
        input.display(),
        output.display()
    );

    let cmd = FfmpegCommand::new(input, output)
        .seek(start.max(0.0))
        .duration(end - start)
        .output_args(encoding.to_ffmpeg_args());

    runner.run_with_progress(&cmd, progress_callback).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_inverted_range() {
        let result = cut_segment(
            "in.mp4",
            "out.mp4",
            5.0,
            5.0,
            &EncodingConfig::quality(),
            &FfmpegRunner::new(),
            |_| {},
        )
        .await;
        assert!(matches!(result, Err(MediaError::InvalidTimestamp(_))));
    }
}
