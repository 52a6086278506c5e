//! Job submission and lifecycle endpoints.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use reelkit_models::{Job, JobId, JobStatus, JobType, ProjectId, VideoId};
use reelkit_queue::QueueStats;
use reelkit_worker::WorkerState;

use crate::error::{ApiError, ApiResult};
use crate::handlers::{require_project, validate_filename};
use crate::state::AppState;

fn default_resolution() -> String {
    "720".to_string()
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub project_id: String,
    pub url: String,
    pub title: Option<String>,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    pub proxy: Option<String>,
    #[serde(default)]
    pub priority: i64,
}

/// POST /download
pub async fn submit_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> ApiResult<Json<Job>> {
    let parsed = url::Url::parse(request.url.trim())
        .map_err(|_| ApiError::Validation("url is not valid".into()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::Validation("url must be http or https".into()));
    }
    if request
        .resolution
        .parse::<reelkit_media::Resolution>()
        .is_err()
    {
        return Err(ApiError::Validation(format!(
            "unknown resolution: {}",
            request.resolution
        )));
    }

    let project = require_project(&state, &request.project_id).await?;
    let mut input = json!({
        "url": request.url.trim(),
        "resolution": request.resolution,
    });
    if let Some(title) = request.title {
        input["title"] = json!(title);
    }
    if let Some(proxy) = request.proxy {
        input["proxy"] = json!(proxy);
    }

    let job = state
        .queue
        .submit(JobType::Download, Some(&project.id), None, &input, request.priority)
        .await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub project_id: String,
    /// Filename already staged in the uploads directory by the HTTP layer.
    pub filename: String,
    pub title: Option<String>,
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub priority: i64,
}

/// POST /upload
pub async fn submit_upload(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> ApiResult<Json<Job>> {
    validate_filename(&request.filename)?;
    let project = require_project(&state, &request.project_id).await?;

    let mut input = json!({ "filename": request.filename });
    if let Some(title) = request.title {
        input["title"] = json!(title);
    }
    if let Some(size) = request.size_bytes {
        input["size_bytes"] = json!(size);
    }

    let job = state
        .queue
        .submit(JobType::Upload, Some(&project.id), None, &input, request.priority)
        .await?;
    Ok(Json(job))
}

/// The transform endpoints share one submission path: load the video,
/// validate the type-specific input, enqueue.
async fn submit_transform(
    state: &AppState,
    project_id: &str,
    video_id: &str,
    job_type: JobType,
    input: serde_json::Value,
    priority: i64,
) -> ApiResult<Json<Job>> {
    let project = require_project(state, project_id).await?;
    let video = state
        .videos
        .by_id(&VideoId::from_string(video_id))
        .await?
        .filter(|v| v.project_id == project.id)
        .ok_or_else(|| ApiError::not_found(format!("video {video_id}")))?;

    let job = state
        .queue
        .submit(job_type, Some(&project.id), Some(&video.id), &input, priority)
        .await?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize, Default)]
pub struct CaptionRequest {
    pub model_size: Option<String>,
    #[serde(default)]
    pub word_level: bool,
    #[serde(default)]
    pub priority: i64,
}

/// POST /projects/{p}/videos/{v}/caption
pub async fn submit_caption(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
    Json(request): Json<CaptionRequest>,
) -> ApiResult<Json<Job>> {
    let model_size = request.model_size.unwrap_or_else(|| "tiny".to_string());
    if model_size.parse::<reelkit_media::ModelSize>().is_err() {
        return Err(ApiError::Validation(format!(
            "unknown model size: {model_size}"
        )));
    }
    submit_transform(
        &state,
        &project_id,
        &video_id,
        JobType::Caption,
        json!({ "model_size": model_size, "word_level": request.word_level }),
        request.priority,
    )
    .await
}

#[derive(Debug, Deserialize, Default)]
pub struct BurnRequest {
    pub caption_id: Option<String>,
    pub style: Option<serde_json::Value>,
    #[serde(default)]
    pub priority: i64,
}

/// POST /projects/{p}/videos/{v}/burn
pub async fn submit_burn(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
    Json(request): Json<BurnRequest>,
) -> ApiResult<Json<Job>> {
    let mut input = json!({});
    if let Some(caption_id) = request.caption_id {
        input["caption_id"] = json!(caption_id);
    }
    if let Some(style) = request.style {
        input["style"] = style;
    }
    submit_transform(
        &state,
        &project_id,
        &video_id,
        JobType::Burn,
        input,
        request.priority,
    )
    .await
}

#[derive(Debug, Deserialize, Default)]
pub struct SplitScenesRequest {
    pub min_scene_len: Option<f64>,
    pub threshold: Option<f64>,
    #[serde(default)]
    pub priority: i64,
}

/// POST /projects/{p}/videos/{v}/split-scenes
pub async fn submit_split_scenes(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
    Json(request): Json<SplitScenesRequest>,
) -> ApiResult<Json<Job>> {
    submit_transform(
        &state,
        &project_id,
        &video_id,
        JobType::SplitScenes,
        json!({
            "min_scene_len": request.min_scene_len.unwrap_or(2.0),
            "threshold": request.threshold.unwrap_or(3.0),
        }),
        request.priority,
    )
    .await
}

#[derive(Debug, Deserialize, Default)]
pub struct SplitFixedRequest {
    pub interval: Option<f64>,
    #[serde(default)]
    pub priority: i64,
}

/// POST /projects/{p}/videos/{v}/split-fixed
pub async fn submit_split_fixed(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
    Json(request): Json<SplitFixedRequest>,
) -> ApiResult<Json<Job>> {
    let interval = request.interval.unwrap_or(30.0);
    if interval <= 0.0 {
        return Err(ApiError::Validation("interval must be positive".into()));
    }
    submit_transform(
        &state,
        &project_id,
        &video_id,
        JobType::SplitFixed,
        json!({ "interval": interval }),
        request.priority,
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct TrimRequest {
    pub start_time: f64,
    pub end_time: f64,
    pub title: Option<String>,
    #[serde(default)]
    pub priority: i64,
}

/// POST /projects/{p}/videos/{v}/trim
pub async fn submit_trim(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
    Json(request): Json<TrimRequest>,
) -> ApiResult<Json<Job>> {
    if request.start_time < 0.0 || request.end_time <= request.start_time {
        return Err(ApiError::Validation(
            "end_time must be after start_time".into(),
        ));
    }
    let mut input = json!({
        "start_time": request.start_time,
        "end_time": request.end_time,
    });
    if let Some(title) = request.title {
        input["title"] = json!(title);
    }
    submit_transform(
        &state,
        &project_id,
        &video_id,
        JobType::Trim,
        input,
        request.priority,
    )
    .await
}

#[derive(Debug, Deserialize, Default)]
pub struct ConvertAspectRequest {
    #[serde(default)]
    pub priority: i64,
}

/// POST /projects/{p}/videos/{v}/convert-aspect
pub async fn submit_convert_aspect(
    State(state): State<AppState>,
    Path((project_id, video_id)): Path<(String, String)>,
    Json(request): Json<ConvertAspectRequest>,
) -> ApiResult<Json<Job>> {
    submit_transform(
        &state,
        &project_id,
        &video_id,
        JobType::ConvertAspect,
        json!({}),
        request.priority,
    )
    .await
}

/// GET /status/{job_id}
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state
        .jobs
        .by_id(&JobId::from_string(job_id.as_str()))
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id}")))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub project_id: Option<String>,
    pub limit: Option<u32>,
}

/// GET /jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<Job>>> {
    let jobs = if let Some(status) = query.status {
        let status: JobStatus = status
            .parse()
            .map_err(|e: reelkit_models::job::UnknownJobStatus| ApiError::Validation(e.to_string()))?;
        state.jobs.by_status(status).await?
    } else if let Some(project_id) = query.project_id {
        state
            .jobs
            .by_project(&ProjectId::from_string(project_id))
            .await?
    } else {
        state.jobs.list_recent(query.limit.unwrap_or(100)).await?
    };
    Ok(Json(jobs))
}

/// POST /jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = JobId::from_string(job_id.as_str());
    state
        .jobs
        .by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id}")))?;
    let cancelled = state.queue.cancel(&id).await?;
    if !cancelled {
        return Err(ApiError::Conflict("job is already terminal".into()));
    }
    Ok(Json(json!({ "success": true })))
}

/// POST /jobs/{id}/retry
///
/// Re-submits the existing job id: the row moves back to pending and is
/// pushed onto the in-memory queue immediately.
pub async fn retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let id = JobId::from_string(job_id.as_str());
    state
        .jobs
        .by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("job {job_id}")))?;

    if !state.jobs.retry(&id).await? {
        return Err(ApiError::Conflict("retry budget exhausted".into()));
    }
    let job = state
        .jobs
        .by_id(&id)
        .await?
        .ok_or_else(|| ApiError::internal("retried job disappeared"))?;
    state.queue.enqueue(&job).await;
    Ok(Json(job))
}

/// DELETE /jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let deleted = state
        .jobs
        .delete(&JobId::from_string(job_id.as_str()))
        .await?;
    if !deleted {
        return Err(ApiError::not_found(format!("job {job_id}")));
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Serialize)]
pub struct QueueStatsResponse {
    pub queue: QueueStats,
    pub workers: Vec<WorkerState>,
}

/// GET /queue/stats
pub async fn queue_stats(State(state): State<AppState>) -> ApiResult<Json<QueueStatsResponse>> {
    Ok(Json(QueueStatsResponse {
        queue: state.queue.stats().await,
        workers: state.pool.worker_states(),
    }))
}
