//! Application state.

use std::sync::Arc;

use reelkit_media::MediaDirs;
use reelkit_queue::JobQueue;
use reelkit_store::{CaptionsRepo, JobsRepo, ProjectsRepo, SettingsRepo, Store, UsersRepo, VideosRepo};
use reelkit_worker::WorkerPool;

use crate::config::ApiConfig;

/// Shared application state. One process owns the store, the queue and the
/// worker pool; the router clones this cheaply per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub store: Store,
    pub users: UsersRepo,
    pub projects: ProjectsRepo,
    pub videos: VideosRepo,
    pub captions: CaptionsRepo,
    pub jobs: JobsRepo,
    pub settings: SettingsRepo,
    pub dirs: MediaDirs,
    pub queue: Arc<JobQueue>,
    pub pool: Arc<WorkerPool>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        store: Store,
        dirs: MediaDirs,
        queue: Arc<JobQueue>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            users: UsersRepo::new(store.clone()),
            projects: ProjectsRepo::new(store.clone()),
            videos: VideosRepo::new(store.clone()),
            captions: CaptionsRepo::new(store.clone()),
            jobs: JobsRepo::new(store.clone()),
            settings: SettingsRepo::new(store.clone()),
            store,
            dirs,
            queue,
            pool,
        }
    }
}
