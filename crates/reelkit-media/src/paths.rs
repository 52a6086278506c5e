//! Artifact filesystem layout.
//!
//! Three well-known directories hold every artifact the system produces.
//! Bare filenames are the stable link between store rows and bytes on disk;
//! this module resolves them back to paths.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{MediaError, MediaResult};

/// The three artifact directories.
#[derive(Debug, Clone)]
pub struct MediaDirs {
    /// Raw/staged/in-progress originals
    pub uploads: PathBuf,
    /// Canonical outputs (clips, burned videos)
    pub processed: PathBuf,
    /// Subtitle files
    pub captions: PathBuf,
}

impl MediaDirs {
    /// Conventional layout under a data root.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            uploads: root.join("uploads"),
            processed: root.join("processed"),
            captions: root.join("captions"),
        }
    }

    /// Create all three directories if missing.
    pub fn ensure(&self) -> MediaResult<()> {
        for dir in [&self.uploads, &self.processed, &self.captions] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Resolve a video filename to its on-disk path.
    ///
    /// Searches uploads first, then processed, then recursively under
    /// processed to locate legacy clips that were written into subfolders.
    pub fn resolve_video(&self, filename: &str) -> Option<PathBuf> {
        let upload = self.uploads.join(filename);
        if upload.is_file() {
            return Some(upload);
        }
        let processed = self.processed.join(filename);
        if processed.is_file() {
            return Some(processed);
        }
        find_in_tree(&self.processed, filename)
    }

    /// Resolve a video filename, erroring when the bytes are missing.
    pub fn require_video(&self, filename: &str) -> MediaResult<PathBuf> {
        self.resolve_video(filename)
            .ok_or_else(|| MediaError::FileNotFound(self.uploads.join(filename)))
    }

    /// Path of a caption file.
    pub fn caption_path(&self, filename: &str) -> PathBuf {
        self.captions.join(filename)
    }

    /// Fresh uploads-name pair for a download: the raw fetch target and the
    /// converted canonical output.
    pub fn fresh_download_names(&self) -> (String, String) {
        let base = Uuid::new_v4();
        (format!("raw_{base}.mp4"), format!("{base}.mp4"))
    }

    /// Fresh canonical name in uploads for an import.
    pub fn fresh_upload_name(&self) -> String {
        format!("{}.mp4", Uuid::new_v4())
    }

    /// Fresh processed name for a trim output.
    pub fn fresh_trim_name(&self) -> String {
        format!("trim_{}.mp4", Uuid::new_v4())
    }

    /// Fresh processed name for a burned video, derived from the source
    /// filename so siblings stay recognizable but never collide.
    pub fn fresh_burned_name(&self, source_filename: &str) -> String {
        let stem = source_filename
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(source_filename);
        format!("burned_{}_{stem}.mp4", Uuid::new_v4())
    }
}

fn find_in_tree(dir: &Path, filename: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && entry.file_name().to_string_lossy() == filename {
            return Some(path);
        }
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    subdirs.iter().find_map(|d| find_in_tree(d, filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_prefers_uploads_then_processed_then_subfolders() {
        let root = tempfile::tempdir().unwrap();
        let dirs = MediaDirs::under(root.path());
        dirs.ensure().unwrap();

        // Legacy clip buried in a subfolder.
        let legacy = dirs.processed.join("clips_old");
        std::fs::create_dir_all(&legacy).unwrap();
        std::fs::write(legacy.join("buried.mp4"), b"x").unwrap();
        assert_eq!(
            dirs.resolve_video("buried.mp4").unwrap(),
            legacy.join("buried.mp4")
        );

        // Same name in processed shadows the subfolder.
        std::fs::write(dirs.processed.join("buried.mp4"), b"x").unwrap();
        assert_eq!(
            dirs.resolve_video("buried.mp4").unwrap(),
            dirs.processed.join("buried.mp4")
        );

        // Same name in uploads shadows everything.
        std::fs::write(dirs.uploads.join("buried.mp4"), b"x").unwrap();
        assert_eq!(
            dirs.resolve_video("buried.mp4").unwrap(),
            dirs.uploads.join("buried.mp4")
        );

        assert!(dirs.resolve_video("missing.mp4").is_none());
        assert!(dirs.require_video("missing.mp4").is_err());
    }

    #[test]
    fn fresh_names_are_unique() {
        let dirs = MediaDirs::under("/tmp/reelkit-test");
        let (raw_a, out_a) = dirs.fresh_download_names();
        let (raw_b, _) = dirs.fresh_download_names();
        assert!(raw_a.starts_with("raw_"));
        assert_ne!(raw_a, raw_b);
        assert_eq!(raw_a.trim_start_matches("raw_"), out_a);

        let burned = dirs.fresh_burned_name("abc.mp4");
        assert!(burned.starts_with("burned_"));
        assert!(burned.ends_with("_abc.mp4"));
    }
}
