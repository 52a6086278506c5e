//! External media tooling for the Reelkit backend.
//!
//! Thin, cancellable adapters around the processes that do the heavy
//! lifting: FFmpeg/FFprobe for encoding and probing, yt-dlp for platform
//! downloads, and a whisper CLI for transcription. Every call carries a
//! timeout and surfaces captured stderr on failure.
//!
//! The crate also owns the artifact filesystem layout ([`MediaDirs`]) and
//! the subtitle codecs (SRT writing, SRT-to-styled-ASS conversion).

pub mod command;
pub mod convert;
pub mod cut;
pub mod download;
pub mod error;
pub mod fs_utils;
pub mod paths;
pub mod probe;
pub mod progress;
pub mod scenes;
pub mod subtitles;
pub mod transcribe;

pub use command::{FfmpegCommand, FfmpegRunner};
pub use convert::{convert_to_vertical, safe_import, AspectPlan};
pub use cut::cut_segment;
pub use download::{fetch_video, is_direct_media_url, Resolution};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use paths::MediaDirs;
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use scenes::{detect_scenes, SceneDetectorConfig};
pub use subtitles::{build_ass_script, burn_captions, write_srt, SrtCue};
pub use transcribe::{ModelSize, Segment, TranscriberCache, Word};
