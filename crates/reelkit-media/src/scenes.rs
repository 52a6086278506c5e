//! Scene boundary detection via FFmpeg's scene-score filter.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Detection pass timeout.
const DETECT_TIMEOUT: Duration = Duration::from_secs(600);

/// Scene detector parameters.
///
/// `threshold` is on the content-difference scale the UI exposes (default
/// 3.0); it is divided by 100 to reach FFmpeg's 0-1 scene score.
#[derive(Debug, Clone)]
pub struct SceneDetectorConfig {
    pub threshold: f64,
    /// Minimum scene length in seconds.
    pub min_scene_len: f64,
}

impl Default for SceneDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            min_scene_len: 2.0,
        }
    }
}

/// Detect scene boundaries, returning `(start, end)` spans covering the
/// whole `[0, duration)` range. A video with no usable cuts yields no
/// spans at all, which callers report as zero scenes.
pub async fn detect_scenes(
    input: impl AsRef<Path>,
    duration: f64,
    config: &SceneDetectorConfig,
) -> MediaResult<Vec<(f64, f64)>> {
    let input = input.as_ref();
    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

    let score = (config.threshold / 100.0).clamp(0.0, 1.0);
    let filter = format!("select='gt(scene,{score})',showinfo");
    info!(
        "detecting scenes in {} (score threshold {score}, min len {}s)",
        input.display(),
        config.min_scene_len
    );

    let run = Command::new("ffmpeg")
        .args(["-v", "info", "-i"])
        .arg(input)
        .args(["-vf", &filter, "-f", "null", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output();

    let output = tokio::time::timeout(DETECT_TIMEOUT, run)
        .await
        .map_err(|_| MediaError::Timeout(DETECT_TIMEOUT.as_secs()))??;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(MediaError::ffmpeg_failed(
            "scene detection pass failed",
            Some(tail(&stderr, 40)),
            output.status.code(),
        ));
    }

    let cuts = parse_cut_times(&stderr);
    debug!("raw cuts: {cuts:?}");
    Ok(build_spans(&cuts, duration, config.min_scene_len))
}

/// Pull `pts_time:` values out of showinfo's stderr chatter.
fn parse_cut_times(stderr: &str) -> Vec<f64> {
    let mut cuts = Vec::new();
    for line in stderr.lines() {
        if !line.contains("Parsed_showinfo") {
            continue;
        }
        if let Some(idx) = line.find("pts_time:") {
            let rest = &line[idx + "pts_time:".len()..];
            let token: String = rest
                .chars()
                .take_while(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            if let Ok(t) = token.parse::<f64>() {
                cuts.push(t);
            }
        }
    }
    cuts.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    cuts
}

/// Assemble `[0, duration)` into spans split at the given cuts, dropping
/// cuts that would create a scene shorter than `min_scene_len`. No usable
/// cuts means no spans: the video is a single scene and is not split.
fn build_spans(cuts: &[f64], duration: f64, min_scene_len: f64) -> Vec<(f64, f64)> {
    if duration <= 0.0 {
        return Vec::new();
    }
    let mut boundaries = vec![0.0];
    for &cut in cuts {
        if cut <= 0.0 || cut >= duration {
            continue;
        }
        if cut - boundaries.last().unwrap() >= min_scene_len {
            boundaries.push(cut);
        }
    }
    // A trailing stub shorter than the minimum merges into the last scene.
    if boundaries.len() > 1 && duration - boundaries.last().unwrap() < min_scene_len {
        boundaries.pop();
    }
    if boundaries.len() == 1 {
        return Vec::new();
    }
    boundaries
        .iter()
        .zip(boundaries.iter().skip(1).chain(std::iter::once(&duration)))
        .map(|(&a, &b)| (a, b))
        .collect()
}

fn tail(s: &str, lines: usize) -> String {
    let all: Vec<&str> = s.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn showinfo_lines_are_parsed() {
        let stderr = "\
[Parsed_showinfo_1 @ 0x1] n:   0 pts:  76800 pts_time:8.0     pos: 12 fmt:yuv420p\n\
random encoder chatter\n\
[Parsed_showinfo_1 @ 0x1] n:   1 pts: 163200 pts_time:17.0    pos: 13 fmt:yuv420p\n\
[Parsed_showinfo_1 @ 0x1] n:   2 pts: 230400 pts_time:24.0    pos: 14 fmt:yuv420p\n";
        assert_eq!(parse_cut_times(stderr), vec![8.0, 17.0, 24.0]);
    }

    #[test]
    fn three_cuts_make_four_spans() {
        let spans = build_spans(&[8.0, 17.0, 24.0], 30.0, 2.0);
        assert_eq!(
            spans,
            vec![(0.0, 8.0), (8.0, 17.0), (17.0, 24.0), (24.0, 30.0)]
        );
        let total: f64 = spans.iter().map(|(a, b)| b - a).sum();
        assert!((total - 30.0).abs() < 1e-9);
    }

    #[test]
    fn no_cuts_means_no_spans() {
        assert!(build_spans(&[], 12.0, 2.0).is_empty());
        // Every cut filtered out degenerates to the same outcome.
        assert!(build_spans(&[0.5, 1.0], 12.0, 2.0).is_empty());
    }

    #[test]
    fn short_scenes_are_merged() {
        // Cut at 1.0 is under the 2s minimum; cut at 29.5 would leave a stub.
        let spans = build_spans(&[1.0, 10.0, 29.5], 30.0, 2.0);
        assert_eq!(spans, vec![(0.0, 10.0), (10.0, 30.0)]);
    }

    #[test]
    fn zero_duration_yields_nothing() {
        assert!(build_spans(&[1.0], 0.0, 2.0).is_empty());
    }
}
