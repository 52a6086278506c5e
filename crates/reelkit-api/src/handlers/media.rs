//! Artifact serving: video bytes, range streaming, caption downloads.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{require_project, validate_filename};
use crate::state::AppState;

fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".mp4") {
        "video/mp4"
    } else if lower.ends_with(".webm") {
        "video/webm"
    } else if lower.ends_with(".srt") {
        "application/x-subrip"
    } else if lower.ends_with(".vtt") {
        "text/vtt"
    } else if lower.ends_with(".ass") {
        "text/plain"
    } else {
        "application/octet-stream"
    }
}

async fn resolve_video_file(
    state: &AppState,
    project_id: &str,
    filename: &str,
) -> ApiResult<std::path::PathBuf> {
    validate_filename(filename)?;
    let project = require_project(state, project_id).await?;
    let video = state
        .videos
        .by_filename(filename)
        .await?
        .filter(|v| v.project_id == project.id)
        .ok_or_else(|| ApiError::not_found(format!("video {filename}")))?;

    // A row without resolvable bytes is an error worth reporting, never a
    // reason to delete anything.
    state
        .dirs
        .resolve_video(&video.filename)
        .ok_or_else(|| ApiError::not_found(format!("bytes for {filename} are missing")))
}

/// GET /video/{project}/{filename}
pub async fn get_video_file(
    State(state): State<AppState>,
    Path((project_id, filename)): Path<(String, String)>,
) -> ApiResult<Response> {
    let path = resolve_video_file(&state, &project_id, &filename).await?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::internal(format!("open {}: {e}", path.display())))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::CONTENT_LENGTH, len)
        .header(header::ACCEPT_RANGES, "bytes")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// GET /stream/{project}/{filename}, honoring HTTP Range.
pub async fn stream_video_file(
    State(state): State<AppState>,
    Path((project_id, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let path = resolve_video_file(&state, &project_id, &filename).await?;
    let mut file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| ApiError::internal(format!("open {}: {e}", path.display())))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| parse_range(raw, len));

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CACHE_CONTROL, "public, max-age=3600");

    match range {
        Some((start, end)) => {
            let span = end - start + 1;
            file.seek(std::io::SeekFrom::Start(start))
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            let reader = file.take(span);
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_LENGTH, span)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {start}-{end}/{len}"),
                )
                .body(Body::from_stream(ReaderStream::new(reader)))
                .map_err(|e| ApiError::internal(e.to_string()))
        }
        None => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, len)
            .body(Body::from_stream(ReaderStream::new(file)))
            .map_err(|e| ApiError::internal(e.to_string())),
    }
}

/// GET /caption/{project}/{filename}
pub async fn get_caption_file(
    State(state): State<AppState>,
    Path((project_id, filename)): Path<(String, String)>,
) -> ApiResult<Response> {
    validate_filename(&filename)?;
    require_project(&state, &project_id).await?;

    let path = state.dirs.caption_path(&filename);
    if !path.is_file() {
        return Err(ApiError::not_found(format!("caption {filename}")));
    }
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&filename))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        )
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Parse a `Range: bytes=...` header into an inclusive `(start, end)` pair.
fn parse_range(raw: &str, len: u64) -> Option<(u64, u64)> {
    if len == 0 {
        return None;
    }
    let spec = raw.strip_prefix("bytes=")?.split(',').next()?.trim();
    let (start_s, end_s) = spec.split_once('-')?;

    if start_s.is_empty() {
        // Suffix range: last N bytes.
        let suffix: u64 = end_s.parse().ok()?;
        if suffix == 0 {
            return None;
        }
        let start = len.saturating_sub(suffix);
        return Some((start, len - 1));
    }

    let start: u64 = start_s.parse().ok()?;
    if start >= len {
        return None;
    }
    let end = if end_s.is_empty() {
        len - 1
    } else {
        end_s.parse::<u64>().ok()?.min(len - 1)
    };
    if end < start {
        return None;
    }
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_parsing() {
        assert_eq!(parse_range("bytes=0-499", 1000), Some((0, 499)));
        assert_eq!(parse_range("bytes=500-", 1000), Some((500, 999)));
        assert_eq!(parse_range("bytes=-200", 1000), Some((800, 999)));
        assert_eq!(parse_range("bytes=0-9999", 1000), Some((0, 999)));
        assert_eq!(parse_range("bytes=1000-", 1000), None);
        assert_eq!(parse_range("bytes=5-2", 1000), None);
        assert_eq!(parse_range("chunks=0-1", 1000), None);
        assert_eq!(parse_range("bytes=0-10", 0), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("a.mp4"), "video/mp4");
        assert_eq!(content_type_for("A.SRT"), "application/x-subrip");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
    }
}
