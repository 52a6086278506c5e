//! Canonical 9:16 aspect conversion and safe import.

use std::path::Path;
use tracing::info;

use reelkit_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoInfo};
use crate::progress::FfmpegProgress;

/// Canonical portrait dimensions.
pub const TARGET_WIDTH: u32 = 1080;
pub const TARGET_HEIGHT: u32 = 1920;

/// Aspect tolerance below which a source counts as already 9:16.
const ASPECT_EPSILON: f64 = 0.01;

/// How a source reaches 9:16.
#[derive(Debug, Clone, PartialEq)]
pub enum AspectPlan {
    /// Already 9:16: scale only.
    ScaleOnly,
    /// Wider than 9:16: center-crop to 9:16, then scale.
    CropAndScale { crop_width: u32, x_offset: u32 },
    /// Taller than 9:16: scale to fit, then letterbox pad.
    ScaleAndPad,
}

impl AspectPlan {
    /// Decide the conversion strategy from probed dimensions.
    pub fn for_dimensions(width: u32, height: u32) -> MediaResult<Self> {
        if width == 0 || height == 0 {
            return Err(MediaError::InvalidVideo(format!(
                "unusable dimensions {width}x{height}"
            )));
        }
        let aspect = width as f64 / height as f64;
        let target = TARGET_WIDTH as f64 / TARGET_HEIGHT as f64;

        if (aspect - target).abs() < ASPECT_EPSILON {
            Ok(AspectPlan::ScaleOnly)
        } else if aspect > target {
            let crop_width = ((height as f64 * target) as u32) & !1;
            let x_offset = (width - crop_width) / 2;
            Ok(AspectPlan::CropAndScale {
                crop_width,
                x_offset,
            })
        } else {
            Ok(AspectPlan::ScaleAndPad)
        }
    }

    /// FFmpeg filter chain realizing the plan.
    pub fn filter(&self, source_height: u32) -> String {
        match self {
            AspectPlan::ScaleOnly => {
                format!("scale={TARGET_WIDTH}:{TARGET_HEIGHT}:flags=lanczos")
            }
            AspectPlan::CropAndScale {
                crop_width,
                x_offset,
            } => format!(
                "crop={crop_width}:{source_height}:{x_offset}:0,\
                 scale={TARGET_WIDTH}:{TARGET_HEIGHT}:flags=lanczos"
            ),
            AspectPlan::ScaleAndPad => format!(
                "scale={TARGET_WIDTH}:{TARGET_HEIGHT}:force_original_aspect_ratio=decrease:flags=lanczos,\
                 pad={TARGET_WIDTH}:{TARGET_HEIGHT}:(ow-iw)/2:(oh-ih)/2:black"
            ),
        }
    }
}

/// Convert a video into the canonical 9:16 mp4.
pub async fn convert_to_vertical<F>(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    runner: &FfmpegRunner,
    progress_callback: F,
) -> MediaResult<()>
where
    F: Fn(FfmpegProgress) + Send + 'static,
{
    let input = input.as_ref();
    let output = output.as_ref();

    let info = probe_video(input).await?;
    let plan = AspectPlan::for_dimensions(info.width, info.height)?;
    info!(
        "converting {} ({}x{}) -> {} via {:?}",
        input.display(),
        info.width,
        info.height,
        output.display(),
        plan
    );

    let encoding = EncodingConfig::quality().with_faststart();
    let cmd = FfmpegCommand::new(input, output)
        .video_filter(plan.filter(info.height))
        .output_args(encoding.to_ffmpeg_args());

    runner.run_with_progress(&cmd, progress_callback).await
}

/// Normalize an arbitrary staged file into a canonical 9:16 mp4.
///
/// Already-canonical sources (9:16, h264 + aac) are remuxed with stream
/// copy; anything else goes through the full conversion. Returns the probed
/// info of the source so callers can record dimensions.
pub async fn safe_import(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    runner: &FfmpegRunner,
) -> MediaResult<VideoInfo> {
    let input = input.as_ref();
    let output = output.as_ref();

    let info = probe_video(input).await?;
    let plan = AspectPlan::for_dimensions(info.width, info.height)?;

    let already_canonical = plan == AspectPlan::ScaleOnly
        && info.codec == "h264"
        && info
            .audio_codec
            .as_deref()
            .map(|c| c == "aac")
            .unwrap_or(true);

    if already_canonical {
        info!("remuxing {} -> {}", input.display(), output.display());
        let cmd = FfmpegCommand::new(input, output)
            .output_arg("-c")
            .output_arg("copy")
            .output_arg("-movflags")
            .output_arg("+faststart");
        runner.run(&cmd).await?;
    } else {
        convert_to_vertical(input, output, runner, |_| {}).await?;
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_portrait_scales_only() {
        let plan = AspectPlan::for_dimensions(1080, 1920).unwrap();
        assert_eq!(plan, AspectPlan::ScaleOnly);
        let filter = plan.filter(1920);
        assert!(!filter.contains("crop"));
        assert!(!filter.contains("pad"));
    }

    #[test]
    fn near_portrait_within_epsilon_scales_only() {
        // 0.5625 vs 608/1080 = 0.5629..., inside the 0.01 window.
        let plan = AspectPlan::for_dimensions(608, 1080).unwrap();
        assert_eq!(plan, AspectPlan::ScaleOnly);
    }

    #[test]
    fn landscape_is_center_cropped() {
        let plan = AspectPlan::for_dimensions(1920, 1080).unwrap();
        match plan {
            AspectPlan::CropAndScale {
                crop_width,
                x_offset,
            } => {
                // 1080 * 9/16 = 607.5, floored to even.
                assert_eq!(crop_width, 606);
                assert_eq!(x_offset, (1920 - 606) / 2);
            }
            other => panic!("expected crop, got {other:?}"),
        }
    }

    #[test]
    fn very_tall_source_is_padded() {
        let plan = AspectPlan::for_dimensions(500, 2000).unwrap();
        assert_eq!(plan, AspectPlan::ScaleAndPad);
        assert!(plan.filter(2000).contains("pad"));
    }

    #[test]
    fn zero_dimensions_rejected() {
        assert!(AspectPlan::for_dimensions(0, 1080).is_err());
    }
}
