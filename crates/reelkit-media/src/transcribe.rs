//! Speech transcription through an external whisper CLI.
//!
//! Audio is first extracted to 16 kHz mono WAV, then handed to a
//! whisper.cpp-style binary producing JSON segments. Models are resolved
//! once per size by a process-scoped cache; resolution is serialized so two
//! jobs asking for the same size do not race.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Whisper model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelSize {
    #[default]
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }
}

impl fmt::Display for ModelSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            other => Err(format!("unknown model size: {other}")),
        }
    }
}

/// One transcribed word with its own timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub start: f64,
    pub end: f64,
    pub word: String,
}

/// One transcribed segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    /// Per-word timings; populated only for word-level transcriptions.
    #[serde(default)]
    pub words: Vec<Word>,
}

/// Process-scoped transcriber with a model cache keyed by size.
pub struct TranscriberCache {
    binary: String,
    model_dir: PathBuf,
    models: Mutex<HashMap<ModelSize, Arc<PathBuf>>>,
}

impl TranscriberCache {
    pub fn new(binary: impl Into<String>, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            model_dir: model_dir.into(),
            models: Mutex::new(HashMap::new()),
        }
    }

    /// Configure from `WHISPER_BIN` / `WHISPER_MODEL_DIR`.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("WHISPER_BIN").unwrap_or_else(|_| "whisper-cli".to_string()),
            std::env::var("WHISPER_MODEL_DIR").unwrap_or_else(|_| "models".to_string()),
        )
    }

    /// Resolve (and cache) the model file for a size.
    async fn model_path(&self, size: ModelSize) -> MediaResult<Arc<PathBuf>> {
        let mut models = self.models.lock().await;
        if let Some(path) = models.get(&size) {
            return Ok(Arc::clone(path));
        }
        let path = self.model_dir.join(format!("ggml-{size}.bin"));
        if !path.is_file() {
            return Err(MediaError::FileNotFound(path));
        }
        info!("loaded whisper model {size} from {}", path.display());
        let path = Arc::new(path);
        models.insert(size, Arc::clone(&path));
        Ok(path)
    }

    /// Transcribe the audio track of `video_path`.
    ///
    /// With `word_level` set, each returned segment is a single word whose
    /// timing is also exposed through `words`.
    pub async fn transcribe(
        &self,
        video_path: impl AsRef<Path>,
        size: ModelSize,
        word_level: bool,
    ) -> MediaResult<Vec<Segment>> {
        let video_path = video_path.as_ref();
        if !video_path.exists() {
            return Err(MediaError::FileNotFound(video_path.to_path_buf()));
        }
        which::which(&self.binary)
            .map_err(|_| MediaError::WhisperNotFound(self.binary.clone()))?;

        let model = self.model_path(size).await?;

        let workdir = tempfile::tempdir()?;
        let wav = workdir.path().join("audio.wav");
        extract_audio(video_path, &wav).await?;

        let out_base = workdir.path().join("transcript");
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-m")
            .arg(model.as_path())
            .arg("-f")
            .arg(&wav)
            .args(["-l", "en", "--output-json"])
            .arg("--output-file")
            .arg(&out_base);
        if word_level {
            cmd.args(["--split-on-word", "--max-len", "1"]);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!("running {} on {}", self.binary, wav.display());
        // Transcription time scales with the model; no cap here.
        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(MediaError::transcription_failed(
                format!("{} exited with {:?}", self.binary, output.status.code()),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        let json_path = out_base.with_extension("json");
        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            MediaError::transcription_failed(
                format!("missing transcript JSON {}: {e}", json_path.display()),
                None,
            )
        })?;
        parse_transcript(&raw, word_level)
    }
}

/// Extract the audio track as 16 kHz mono PCM WAV.
async fn extract_audio(video: &Path, wav: &Path) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video, wav)
        .output_arg("-vn")
        .output_args(["-ar", "16000", "-ac", "1", "-c:a", "pcm_s16le"]);
    FfmpegRunner::new().with_timeout(600).run(&cmd).await
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    transcription: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    offsets: WhisperOffsets,
    text: String,
}

#[derive(Debug, Deserialize)]
struct WhisperOffsets {
    from: i64,
    to: i64,
}

fn parse_transcript(raw: &str, word_level: bool) -> MediaResult<Vec<Segment>> {
    let output: WhisperOutput = serde_json::from_str(raw)?;
    let segments = output
        .transcription
        .into_iter()
        .filter_map(|seg| {
            let text = seg.text.trim().to_string();
            if text.is_empty() {
                return None;
            }
            let start = seg.offsets.from as f64 / 1000.0;
            let end = seg.offsets.to as f64 / 1000.0;
            let words = if word_level {
                vec![Word {
                    start,
                    end,
                    word: text.clone(),
                }]
            } else {
                Vec::new()
            };
            Some(Segment {
                start,
                end,
                text,
                words,
            })
        })
        .collect();
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "transcription": [
            {"timestamps": {"from": "00:00:00,000", "to": "00:00:02,500"},
             "offsets": {"from": 0, "to": 2500}, "text": " Hello there."},
            {"timestamps": {"from": "00:00:02,500", "to": "00:00:03,000"},
             "offsets": {"from": 2500, "to": 3000}, "text": "   "},
            {"timestamps": {"from": "00:00:03,000", "to": "00:00:04,200"},
             "offsets": {"from": 3000, "to": 4200}, "text": " General Kenobi."}
        ]
    }"#;

    #[test]
    fn sentence_level_parse_drops_blank_segments() {
        let segments = parse_transcript(SAMPLE, false).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello there.");
        assert!((segments[0].start - 0.0).abs() < 1e-9);
        assert!((segments[0].end - 2.5).abs() < 1e-9);
        assert!(segments[0].words.is_empty());
    }

    #[test]
    fn word_level_parse_exposes_word_timings() {
        let segments = parse_transcript(SAMPLE, true).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].words.len(), 1);
        assert_eq!(segments[1].words[0].word, "General Kenobi.");
        assert!((segments[1].words[0].end - 4.2).abs() < 1e-9);
    }

    #[test]
    fn model_sizes_parse() {
        assert_eq!("tiny".parse::<ModelSize>().unwrap(), ModelSize::Tiny);
        assert_eq!("large".parse::<ModelSize>().unwrap(), ModelSize::Large);
        assert!("huge".parse::<ModelSize>().is_err());
    }
}
