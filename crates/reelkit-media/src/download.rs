//! Video fetching: yt-dlp for platforms, direct HTTP streaming otherwise.

use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};

/// Default fetch timeout.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Extensions treated as directly streamable media.
const DIRECT_EXTENSIONS: [&str; 6] = [".mp4", ".webm", ".mov", ".avi", ".mkv", ".flv"];

/// Requested download resolution ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    R360,
    R480,
    #[default]
    R720,
    R1080,
    Max,
}

impl Resolution {
    /// yt-dlp format selector: prefer mp4+m4a under the height ceiling.
    pub fn format_selector(&self) -> String {
        match self.height_ceiling() {
            Some(h) => format!(
                "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}][ext=mp4]/best"
            ),
            None => "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
        }
    }

    fn height_ceiling(&self) -> Option<u32> {
        match self {
            Resolution::R360 => Some(360),
            Resolution::R480 => Some(480),
            Resolution::R720 => Some(720),
            Resolution::R1080 => Some(1080),
            Resolution::Max => None,
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "360" => Ok(Resolution::R360),
            "480" => Ok(Resolution::R480),
            "720" => Ok(Resolution::R720),
            "1080" => Ok(Resolution::R1080),
            "max" => Ok(Resolution::Max),
            other => Err(format!("unknown resolution: {other}")),
        }
    }
}

/// True when the URL points straight at a media file.
pub fn is_direct_media_url(url: &str) -> bool {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|_| url.to_lowercase());
    DIRECT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Fetch a video to `dest`.
///
/// Direct media URLs stream over HTTP with chunked progress; everything
/// else goes through yt-dlp with a resolution-derived format selector.
/// `progress` receives `(downloaded_bytes, total_bytes)` for direct fetches.
pub async fn fetch_video<F>(
    url: &str,
    dest: impl AsRef<Path>,
    resolution: Resolution,
    proxy: Option<&str>,
    timeout: Duration,
    progress: F,
) -> MediaResult<()>
where
    F: Fn(u64, Option<u64>) + Send,
{
    let dest = dest.as_ref();
    if is_direct_media_url(url) {
        fetch_direct(url, dest, proxy, timeout, progress).await
    } else {
        fetch_with_ytdlp(url, dest, resolution, proxy, timeout).await
    }
}

async fn fetch_direct<F>(
    url: &str,
    dest: &Path,
    proxy: Option<&str>,
    timeout: Duration,
    progress: F,
) -> MediaResult<()>
where
    F: Fn(u64, Option<u64>) + Send,
{
    info!("direct download {url} -> {}", dest.display());

    let mut builder = reqwest::Client::builder()
        .user_agent("Mozilla/5.0")
        .connect_timeout(Duration::from_secs(30))
        .timeout(timeout);
    if let Some(proxy) = proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }
    let client = builder.build()?;

    let response = client.get(url).send().await?.error_for_status()?;
    let total = response.content_length();

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress(downloaded, total);
    }
    file.flush().await?;

    if downloaded == 0 {
        return Err(MediaError::download_failed("empty response body"));
    }
    Ok(())
}

async fn fetch_with_ytdlp(
    url: &str,
    dest: &Path,
    resolution: Resolution,
    proxy: Option<&str>,
    timeout: Duration,
) -> MediaResult<()> {
    which::which("yt-dlp").map_err(|_| MediaError::YtDlpNotFound)?;

    let selector = resolution.format_selector();
    info!("yt-dlp download {url} -> {} ({selector})", dest.display());

    let mut cmd = Command::new("yt-dlp");
    cmd.args(["-f", &selector])
        .args(["--no-playlist", "--merge-output-format", "mp4"])
        .args(["--socket-timeout", "30", "--retries", "3"])
        .arg("-o")
        .arg(dest);
    if let Some(proxy) = proxy {
        cmd.args(["--proxy", proxy]);
    }
    cmd.arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| MediaError::Timeout(timeout.as_secs()))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!("yt-dlp stderr: {stderr}");
        return Err(MediaError::download_failed(format!(
            "yt-dlp failed: {}",
            stderr.lines().last().unwrap_or("unknown error")
        )));
    }
    if !dest.exists() {
        return Err(MediaError::download_failed("output file not created"));
    }
    Ok(())
}

/// Best-effort title extraction without downloading.
///
/// Direct URLs use the path basename; platforms are asked via yt-dlp
/// metadata. Falls back to "video".
pub async fn extract_title(url: &str, proxy: Option<&str>) -> String {
    if is_direct_media_url(url) {
        return title_from_path(url);
    }

    if which::which("yt-dlp").is_err() {
        return "video".to_string();
    }
    let mut cmd = Command::new("yt-dlp");
    cmd.args(["--skip-download", "--no-playlist", "--print", "title"]);
    if let Some(proxy) = proxy {
        cmd.args(["--proxy", proxy]);
    }
    cmd.arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    let result = tokio::time::timeout(Duration::from_secs(30), cmd.output()).await;
    match result {
        Ok(Ok(output)) if output.status.success() => {
            let title = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if title.is_empty() {
                "video".to_string()
            } else {
                title
            }
        }
        _ => "video".to_string(),
    }
}

fn title_from_path(url: &str) -> String {
    let basename = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.last().map(str::to_string))
        })
        .unwrap_or_default();
    let stem = basename
        .rsplit_once('.')
        .map(|(stem, _)| stem.to_string())
        .unwrap_or(basename);
    if stem.is_empty() {
        "video".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_urls_by_extension() {
        assert!(is_direct_media_url("https://cdn.example.com/v/clip.mp4"));
        assert!(is_direct_media_url("https://cdn.example.com/clip.MKV?sig=1"));
        assert!(!is_direct_media_url("https://youtube.com/watch?v=abc123"));
        assert!(!is_direct_media_url("https://example.com/page.html"));
    }

    #[test]
    fn format_selector_carries_height_ceiling() {
        assert!(Resolution::R720
            .format_selector()
            .contains("height<=720"));
        assert!(!Resolution::Max.format_selector().contains("height<="));
        assert_eq!("1080".parse::<Resolution>().unwrap(), Resolution::R1080);
        assert!("4k".parse::<Resolution>().is_err());
    }

    #[test]
    fn title_from_direct_url() {
        assert_eq!(
            title_from_path("https://cdn.example.com/media/intro_take2.mp4"),
            "intro_take2"
        );
        assert_eq!(title_from_path("https://cdn.example.com/"), "video");
    }
}
