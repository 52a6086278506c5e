//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::health::{health, ready};
use crate::handlers::jobs::{
    cancel_job, delete_job, job_status, list_jobs, queue_stats, retry_job, submit_burn,
    submit_caption, submit_convert_aspect, submit_download, submit_split_fixed,
    submit_split_scenes, submit_trim, submit_upload,
};
use crate::handlers::media::{get_caption_file, get_video_file, stream_video_file};
use crate::handlers::projects::{
    create_project, delete_project, get_project, list_projects, restore_project, update_project,
};
use crate::handlers::storage::{
    storage_bulk_delete, storage_cleanup, storage_files, storage_stats,
};
use crate::handlers::users::{create_user, delete_user, list_users};
use crate::handlers::videos::{
    bulk_delete_videos, delete_video, get_video, list_videos, restore_video, update_video,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let project_routes = Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/restore", post(restore_project));

    let video_routes = Router::new()
        .route("/projects/:id/videos", get(list_videos))
        .route("/projects/:id/videos/bulk-delete", post(bulk_delete_videos))
        .route(
            "/projects/:id/videos/:vid",
            get(get_video).put(update_video).delete(delete_video),
        )
        .route("/projects/:id/videos/:vid/restore", post(restore_video));

    let job_routes = Router::new()
        .route("/download", post(submit_download))
        .route("/upload", post(submit_upload))
        .route("/projects/:id/videos/:vid/caption", post(submit_caption))
        .route("/projects/:id/videos/:vid/burn", post(submit_burn))
        .route(
            "/projects/:id/videos/:vid/split-scenes",
            post(submit_split_scenes),
        )
        .route(
            "/projects/:id/videos/:vid/split-fixed",
            post(submit_split_fixed),
        )
        .route("/projects/:id/videos/:vid/trim", post(submit_trim))
        .route(
            "/projects/:id/videos/:vid/convert-aspect",
            post(submit_convert_aspect),
        )
        .route("/status/:job_id", get(job_status))
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id/cancel", post(cancel_job))
        .route("/jobs/:id/retry", post(retry_job))
        .route("/jobs/:id", delete(delete_job))
        .route("/queue/stats", get(queue_stats));

    let media_routes = Router::new()
        .route("/video/:project/:filename", get(get_video_file))
        .route("/stream/:project/:filename", get(stream_video_file))
        .route("/caption/:project/:filename", get(get_caption_file));

    let storage_routes = Router::new()
        .route("/storage/stats", get(storage_stats))
        .route("/storage/files", get(storage_files))
        .route("/storage/cleanup", post(storage_cleanup))
        .route("/storage/bulk-delete", post(storage_bulk_delete));

    let user_routes = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", delete(delete_user));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    let max_body = state.config.max_body_size;
    Router::new()
        .merge(project_routes)
        .merge(video_routes)
        .merge(job_routes)
        .merge(media_routes)
        .merge(storage_routes)
        .merge(user_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}
