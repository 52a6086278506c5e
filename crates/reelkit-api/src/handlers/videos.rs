//! Video listing and metadata endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use reelkit_models::{Video, VideoId};
use reelkit_store::UpdateVideo;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{require_project, validate_filename};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListVideosQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

/// GET /projects/{id}/videos
pub async fn list_videos(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(query): Query<ListVideosQuery>,
) -> ApiResult<Json<Vec<Video>>> {
    let project = require_project(&state, &project_id).await?;
    let videos = state
        .videos
        .by_project(&project, query.include_deleted)
        .await?;
    Ok(Json(videos))
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub video_ids: Vec<String>,
}

/// POST /projects/{id}/videos/bulk-delete
pub async fn bulk_delete_videos(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<BulkDeleteRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    require_project(&state, &project_id).await?;
    let ids: Vec<VideoId> = request
        .video_ids
        .into_iter()
        .map(VideoId::from_string)
        .collect();
    let deleted = state.videos.delete_many(&ids).await?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}

/// Load a video and verify it belongs to the project.
async fn require_video_in_project(
    state: &AppState,
    project_id: &str,
    video_id: &str,
) -> ApiResult<Video> {
    let project = require_project(state, project_id).await?;
    let video = state
        .videos
        .by_id(&VideoId::from_string(video_id))
        .await?
        .filter(|v| v.project_id == project.id)
        .ok_or_else(|| ApiError::not_found(format!("video {video_id}")))?;
    Ok(video)
}

/// GET /projects/{id}/videos/{vid}
pub async fn get_video(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
) -> ApiResult<Json<Video>> {
    Ok(Json(
        require_video_in_project(&state, &project_id, &video_id).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateVideoRequest {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub source_url: Option<String>,
    pub duration: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: Option<u64>,
    pub is_clip: Option<bool>,
    pub parent_video_id: Option<String>,
}

/// PUT /projects/{id}/videos/{vid}
pub async fn update_video(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
    Json(request): Json<UpdateVideoRequest>,
) -> ApiResult<Json<Video>> {
    let video = require_video_in_project(&state, &project_id, &video_id).await?;

    if let Some(title) = &request.title {
        if title.trim().is_empty() {
            return Err(ApiError::Validation("title cannot be empty".into()));
        }
    }
    if let Some(filename) = &request.filename {
        validate_filename(filename)?;
    }

    let update = UpdateVideo {
        title: request.title.map(|t| t.trim().to_string()),
        filename: request.filename,
        source_url: request.source_url.map(Some),
        duration: request.duration.map(Some),
        width: request.width.map(Some),
        height: request.height.map(Some),
        size_bytes: request.size_bytes.map(Some),
        is_clip: request.is_clip,
        parent_video_id: request.parent_video_id.map(|p| Some(VideoId::from_string(p))),
    };
    let updated = state
        .videos
        .update(&video.id, update)
        .await
        .map_err(|e| match e {
            reelkit_store::StoreError::InvalidReference(msg) => ApiError::BadRequest(msg),
            other => ApiError::Store(other),
        })?
        .ok_or_else(|| ApiError::not_found(format!("video {video_id}")))?;
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub struct DeleteVideoQuery {
    #[serde(default)]
    pub hard: bool,
}

/// DELETE /projects/{id}/videos/{vid}
///
/// Soft-delete by default: the bytes stay on disk until an admin reclaims
/// them through the storage endpoints.
pub async fn delete_video(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
    Query(query): Query<DeleteVideoQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let video = require_video_in_project(&state, &project_id, &video_id).await?;
    let deleted = state.videos.delete(&video.id, query.hard).await?;
    Ok(Json(json!({ "success": deleted })))
}

/// POST /projects/{id}/videos/{vid}/restore
pub async fn restore_video(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
) -> ApiResult<Json<Video>> {
    require_project(&state, &project_id).await?;
    let restored = state
        .videos
        .restore(&VideoId::from_string(video_id.as_str()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("video {video_id}")))?;
    Ok(Json(restored))
}
