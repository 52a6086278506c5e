//! Subtitle codecs: SRT writing and styled-ASS burning.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reelkit_models::{CaptionStyle, EncodingConfig};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::transcribe::Segment;

/// Font used when the requested one cannot be resolved by the encoder.
const FALLBACK_FONT: &str = "DejaVu Sans";

/// Default caption font.
const DEFAULT_FONT: &str = "Arial Black";

/// Format seconds as an SRT timestamp (`HH:MM:SS,mmm`).
pub fn format_srt_timestamp(t: f64) -> String {
    let t = t.max(0.0);
    let hours = (t / 3600.0) as u64;
    let minutes = ((t % 3600.0) / 60.0) as u64;
    let seconds = (t % 60.0) as u64;
    let millis = ((t - t.floor()) * 1000.0).round() as u64 % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Write segments to an SRT file.
///
/// Sentence-level emits one cue per segment; `word_level` emits one cue per
/// non-empty word. Text is uppercased. Returns the number of cues written.
pub fn write_srt(segments: &[Segment], path: impl AsRef<Path>, word_level: bool) -> MediaResult<usize> {
    let mut lines: Vec<String> = Vec::new();
    let mut index = 1usize;

    let mut emit = |start: f64, end: f64, text: &str| {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        lines.push(index.to_string());
        lines.push(format!(
            "{} --> {}",
            format_srt_timestamp(start),
            format_srt_timestamp(end)
        ));
        lines.push(text.to_uppercase());
        lines.push(String::new());
        index += 1;
    };

    if word_level {
        for segment in segments {
            for word in &segment.words {
                emit(word.start, word.end, &word.word);
            }
        }
    } else {
        for segment in segments {
            emit(segment.start, segment.end, &segment.text);
        }
    }

    std::fs::write(path.as_ref(), lines.join("\n"))?;
    Ok(index - 1)
}

/// One parsed SRT cue.
#[derive(Debug, Clone, PartialEq)]
pub struct SrtCue {
    pub start: String,
    pub end: String,
    pub text: String,
}

/// Parse SRT content into cues. Malformed blocks are skipped.
pub fn parse_srt(content: &str) -> Vec<SrtCue> {
    let mut cues = Vec::new();
    for block in content.replace("\r\n", "\n").split("\n\n") {
        let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.len() < 3 {
            continue;
        }
        let Some((start, end)) = lines[1].split_once(" --> ") else {
            continue;
        };
        cues.push(SrtCue {
            start: start.trim().to_string(),
            end: end.trim().to_string(),
            text: lines[2..].join(" "),
        });
    }
    cues
}

/// Convert an SRT timestamp (`00:00:00,000`) to ASS (`0:00:00.00`).
fn srt_to_ass_time(srt_time: &str) -> String {
    let parts: Vec<&str> = srt_time.split(':').collect();
    if parts.len() != 3 {
        return "0:00:00.00".to_string();
    }
    let Some((secs, millis)) = parts[2].split_once(',') else {
        return "0:00:00.00".to_string();
    };
    let hours: u64 = parts[0].parse().unwrap_or(0);
    let centis = &millis[..millis.len().min(2)];
    format!("{hours}:{}:{secs}.{centis:0<2}", parts[1])
}

/// Convert `#RRGGBB` to the ASS color encoding `&H00BBGGRR`.
fn to_ass_color(hex: Option<&str>, fallback: &str) -> String {
    let hex = hex.unwrap_or(fallback).trim_start_matches('#');
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let (r, rest) = hex.split_at(2);
        let (g, b) = rest.split_at(2);
        format!("&H00{b}{g}{r}")
    } else {
        "&H00FFFFFF".to_string()
    }
}

/// Map a UI alignment value onto the ASS numpad convention.
/// 2 = bottom-center, 10 = middle-center, 6 = top-center.
fn to_ass_alignment(ui_alignment: Option<u32>) -> u32 {
    match ui_alignment {
        Some(10) => 5,
        Some(6) => 8,
        _ => 2,
    }
}

/// Build a styled ASS script from SRT cues.
pub fn build_ass_script(cues: &[SrtCue], style: &CaptionStyle) -> String {
    build_ass_script_with_font(
        cues,
        style,
        style.font_name.as_deref().unwrap_or(DEFAULT_FONT),
    )
}

fn build_ass_script_with_font(cues: &[SrtCue], style: &CaptionStyle, font: &str) -> String {
    let font_size = style.font_size.unwrap_or(32);
    let primary = to_ass_color(style.primary_color.as_deref(), "#ffffff");
    let outline = to_ass_color(style.outline_color.as_deref(), "#000000");
    let back = to_ass_color(style.background_color.as_deref(), "#000000");
    let alignment = to_ass_alignment(style.alignment);
    let border_style = match style.border_style {
        Some(3) => 3,
        _ => 1,
    };
    // Outline width only applies to the outline border style.
    let outline_width = if border_style == 1 { 2 } else { 0 };
    let spacing = style.letter_spacing.unwrap_or(0.0);
    let shadow = style.shadow_blur.unwrap_or(0.0);

    let mut script = vec![
        "[Script Info]".to_string(),
        "ScriptType: v4.00+".to_string(),
        "PlayResX: 1280".to_string(),
        "PlayResY: 720".to_string(),
        "ScaledBorderAndShadow: yes".to_string(),
        String::new(),
        "[V4+ Styles]".to_string(),
        "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, \
         BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
         BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding"
            .to_string(),
        format!(
            "Style: Default,{font},{font_size},{primary},&H000000FF,{outline},{back},\
             1,0,0,0,100,100,{spacing},0,{border_style},{outline_width},{shadow},\
             {alignment},10,10,20,1"
        ),
        String::new(),
        "[Events]".to_string(),
        "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text"
            .to_string(),
    ];

    for cue in cues {
        let start = srt_to_ass_time(&cue.start);
        let end = srt_to_ass_time(&cue.end);
        let text = cue.text.to_uppercase();
        script.push(format!("Dialogue: 0,{start},{end},Default,,0,0,0,,{text}"));
    }
    script.join("\n")
}

/// Burn a caption file into the video frames.
///
/// The SRT is converted to a styled ASS script, then rendered through the
/// `subtitles` filter with the audio copied through. An encoder failure that
/// points at font selection is retried once with a guaranteed-available
/// system font.
pub async fn burn_captions(
    video_path: impl AsRef<Path>,
    srt_path: impl AsRef<Path>,
    output: impl AsRef<Path>,
    style: &CaptionStyle,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    let video_path = video_path.as_ref();
    let srt_path = srt_path.as_ref();
    let output = output.as_ref();

    let content = std::fs::read_to_string(srt_path)?;
    let cues = parse_srt(&content);
    let ass_path = srt_path.with_extension("ass");

    let result = burn_with_script(
        video_path,
        &ass_path,
        output,
        build_ass_script(&cues, style),
        runner,
    )
    .await;

    let result = match result {
        Err(e) if is_font_failure(&e) => {
            warn!(
                "font selection failed for {:?}, retrying with {FALLBACK_FONT}",
                style.font_name
            );
            burn_with_script(
                video_path,
                &ass_path,
                output,
                build_ass_script_with_font(&cues, style, FALLBACK_FONT),
                runner,
            )
            .await
        }
        other => other,
    };

    if ass_path.exists() {
        let _ = std::fs::remove_file(&ass_path);
    }
    result
}

async fn burn_with_script(
    video_path: &Path,
    ass_path: &PathBuf,
    output: &Path,
    script: String,
    runner: &FfmpegRunner,
) -> MediaResult<()> {
    std::fs::write(ass_path, script)?;
    info!(
        "burning {} into {} -> {}",
        ass_path.display(),
        video_path.display(),
        output.display()
    );

    let encoding = EncodingConfig::fast();
    let cmd = FfmpegCommand::new(video_path, output)
        .video_filter(format!("subtitles='{}'", escape_filter_path(ass_path)))
        .output_args([
            "-c:v".to_string(),
            encoding.codec,
            "-preset".to_string(),
            encoding.preset,
            "-crf".to_string(),
            encoding.crf.to_string(),
        ])
        .copy_audio();
    runner.run(&cmd).await
}

/// Escape a path for use inside an FFmpeg filter argument.
fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").replace(':', "\\:")
}

fn is_font_failure(err: &MediaError) -> bool {
    err.stderr()
        .map(|s| {
            let s = s.to_lowercase();
            s.contains("fontselect") || s.contains("font provider") || s.contains("font")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::Word;

    fn segment(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start,
            end,
            text: text.to_string(),
            words: Vec::new(),
        }
    }

    #[test]
    fn srt_timestamps() {
        assert_eq!(format_srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(format_srt_timestamp(61.5), "00:01:01,500");
        assert_eq!(format_srt_timestamp(3661.042), "01:01:01,042");
        assert_eq!(format_srt_timestamp(-3.0), "00:00:00,000");
    }

    #[test]
    fn sentence_level_srt_is_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");
        let segments = vec![
            segment(0.0, 2.5, " hello there "),
            segment(2.5, 3.0, "   "),
            segment(3.0, 4.2, "general kenobi"),
        ];
        let count = write_srt(&segments, &path, false).unwrap();
        assert_eq!(count, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        let cues = parse_srt(&content);
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0].text, "HELLO THERE");
        assert_eq!(cues[0].start, "00:00:00,000");
        assert_eq!(cues[1].end, "00:00:04,200");

        // Indices start at 1 and increase by 1.
        let indices: Vec<&str> = content
            .split("\n\n")
            .filter_map(|b| b.lines().next())
            .collect();
        assert_eq!(indices, vec!["1", "2"]);
    }

    #[test]
    fn word_level_srt_emits_one_cue_per_word() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.srt");
        let segments = vec![Segment {
            start: 0.0,
            end: 1.0,
            text: "hi there".to_string(),
            words: vec![
                Word {
                    start: 0.0,
                    end: 0.4,
                    word: "hi".into(),
                },
                Word {
                    start: 0.4,
                    end: 1.0,
                    word: "there".into(),
                },
                Word {
                    start: 1.0,
                    end: 1.0,
                    word: "  ".into(),
                },
            ],
        }];
        let count = write_srt(&segments, &path, true).unwrap();
        assert_eq!(count, 2);

        let cues = parse_srt(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(cues[0].text, "HI");
        assert_eq!(cues[1].text, "THERE");
    }

    #[test]
    fn zero_segments_writes_zero_cues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.srt");
        let count = write_srt(&[], &path, false).unwrap();
        assert_eq!(count, 0);
        assert!(parse_srt(&std::fs::read_to_string(&path).unwrap()).is_empty());
    }

    #[test]
    fn ass_colors_and_alignment() {
        assert_eq!(to_ass_color(Some("#ffffff"), "#000000"), "&H00FFFFFF");
        assert_eq!(to_ass_color(Some("#ff8000"), "#000000"), "&H000080FF");
        assert_eq!(to_ass_color(None, "#000000"), "&H00000000");
        assert_eq!(to_ass_color(Some("nonsense"), "#000000"), "&H00FFFFFF");

        assert_eq!(to_ass_alignment(Some(2)), 2);
        assert_eq!(to_ass_alignment(Some(10)), 5);
        assert_eq!(to_ass_alignment(Some(6)), 8);
        assert_eq!(to_ass_alignment(None), 2);
    }

    #[test]
    fn ass_script_embeds_style_parameters() {
        let cues = vec![SrtCue {
            start: "00:00:01,000".into(),
            end: "00:00:02,500".into(),
            text: "hello".into(),
        }];
        let style = CaptionStyle {
            font_name: Some("Impact".into()),
            font_size: Some(48),
            primary_color: Some("#ff0000".into()),
            alignment: Some(10),
            border_style: Some(3),
            letter_spacing: Some(1.5),
            shadow_blur: Some(2.0),
            ..Default::default()
        };
        let script = build_ass_script(&cues, &style);

        assert!(script.contains("Style: Default,Impact,48,&H000000FF,"));
        assert!(script.contains("&H000000FF")); // red primary in BGR
        assert!(script.contains(",1.5,0,3,0,2,5,")); // spacing, border 3, shadow, middle-center
        assert!(script.contains("Dialogue: 0,0:00:01.00,0:00:02.50,Default,,0,0,0,,HELLO"));
    }

    #[test]
    fn srt_to_ass_time_conversion() {
        assert_eq!(srt_to_ass_time("00:01:02,340"), "0:01:02.34");
        assert_eq!(srt_to_ass_time("10:00:00,005"), "10:00:00.00");
        assert_eq!(srt_to_ass_time("garbage"), "0:00:00.00");
    }
}
