//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";

/// Video encoding configuration passed to the encoder adapter.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264")
    pub codec: String,
    /// Encoding preset (e.g., "veryfast", "slow")
    pub preset: String,
    /// Constant Rate Factor (quality, 0-51, lower is better)
    pub crf: u8,
    /// Audio codec
    pub audio_codec: String,
    /// Audio bitrate
    pub audio_bitrate: String,
    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::quality()
    }
}

impl EncodingConfig {
    /// High-quality profile used for canonical conversions and cuts.
    pub fn quality() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: "slow".to_string(),
            crf: 18,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: "192k".to_string(),
            extra_args: Vec::new(),
        }
    }

    /// Fast profile used where turnaround beats quality (subtitle burns).
    pub fn fast() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: "128k".to_string(),
            extra_args: Vec::new(),
        }
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Append `-movflags +faststart` for progressive playback.
    pub fn with_faststart(mut self) -> Self {
        self.extra_args
            .extend(["-movflags".to_string(), "+faststart".to_string()]);
        self
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ];
        args.extend(self.extra_args.clone());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_profile_args() {
        let args = EncodingConfig::quality().to_ffmpeg_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"18".to_string()));
        assert!(args.contains(&"slow".to_string()));
    }

    #[test]
    fn faststart_appends_movflags() {
        let args = EncodingConfig::quality().with_faststart().to_ffmpeg_args();
        assert!(args.contains(&"-movflags".to_string()));
        assert!(args.contains(&"+faststart".to_string()));
    }
}
