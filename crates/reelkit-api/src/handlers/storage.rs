//! Admin storage introspection and reclamation.
//!
//! These endpoints sit behind admin authentication enforced by the outer
//! HTTP shell; the handlers themselves only touch the three artifact
//! directories and refuse anything outside them.

use std::path::Path as FsPath;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::handlers::validate_filename;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DirStats {
    pub files: u64,
    pub bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct StorageStatsResponse {
    pub uploads: DirStats,
    pub processed: DirStats,
    pub captions: DirStats,
}

fn dir_stats(dir: &FsPath) -> DirStats {
    let mut stats = DirStats { files: 0, bytes: 0 };
    walk(dir, &mut |_, metadata| {
        stats.files += 1;
        stats.bytes += metadata.len();
    });
    stats
}

fn walk(dir: &FsPath, visit: &mut impl FnMut(&FsPath, &std::fs::Metadata)) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, visit);
        } else if let Ok(metadata) = entry.metadata() {
            visit(&path, &metadata);
        }
    }
}

/// GET /storage/stats
pub async fn storage_stats(State(state): State<AppState>) -> ApiResult<Json<StorageStatsResponse>> {
    Ok(Json(StorageStatsResponse {
        uploads: dir_stats(&state.dirs.uploads),
        processed: dir_stats(&state.dirs.processed),
        captions: dir_stats(&state.dirs.captions),
    }))
}

#[derive(Debug, Serialize)]
pub struct StorageFile {
    pub name: String,
    pub kind: &'static str,
    pub size: u64,
    /// Whether a live Video row references this filename.
    pub referenced: bool,
}

/// GET /storage/files
pub async fn storage_files(State(state): State<AppState>) -> ApiResult<Json<Vec<StorageFile>>> {
    let mut files = Vec::new();
    for (kind, dir) in [
        ("uploads", &state.dirs.uploads),
        ("processed", &state.dirs.processed),
        ("captions", &state.dirs.captions),
    ] {
        let mut collected = Vec::new();
        walk(dir, &mut |path, metadata| {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                collected.push((name.to_string(), metadata.len()));
            }
        });
        for (name, size) in collected {
            let referenced = if kind == "captions" {
                state.captions.by_filename(&name).await?.is_some()
            } else {
                state.videos.by_filename(&name).await?.is_some()
            };
            files.push(StorageFile {
                name,
                kind,
                size,
                referenced,
            });
        }
    }
    files.sort_by(|a, b| b.size.cmp(&a.size));
    Ok(Json(files))
}

#[derive(Debug, Deserialize, Default)]
pub struct CleanupRequest {
    /// Only delete files with no live Video row. Default clears everything.
    #[serde(default)]
    pub orphans_only: bool,
}

/// POST /storage/cleanup
pub async fn storage_cleanup(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut removed: u64 = 0;
    let mut freed: u64 = 0;

    for dir in [&state.dirs.uploads, &state.dirs.processed] {
        let mut candidates = Vec::new();
        walk(dir, &mut |path, metadata| {
            candidates.push((path.to_path_buf(), metadata.len()));
        });
        for (path, size) in candidates {
            if request.orphans_only {
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or_default();
                if state.videos.by_filename(name).await?.is_some() {
                    continue;
                }
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    removed += 1;
                    freed += size;
                }
                Err(e) => warn!("could not remove {}: {e}", path.display()),
            }
        }
    }

    info!(removed, freed, "storage cleanup finished");
    Ok(Json(json!({ "success": true, "removed": removed, "freed_bytes": freed })))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteFilesRequest {
    pub filenames: Vec<String>,
}

/// POST /storage/bulk-delete
///
/// Deletes the named files from whichever artifact directory holds them.
pub async fn storage_bulk_delete(
    State(state): State<AppState>,
    Json(request): Json<BulkDeleteFilesRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut removed: u64 = 0;
    for filename in &request.filenames {
        validate_filename(filename)?;
        let candidates = [
            state.dirs.uploads.join(filename),
            state.dirs.processed.join(filename),
            state.dirs.captions.join(filename),
        ];
        for path in candidates {
            if path.is_file() {
                match std::fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("could not remove {}: {e}", path.display()),
                }
            }
        }
    }
    Ok(Json(json!({ "success": true, "removed": removed })))
}
