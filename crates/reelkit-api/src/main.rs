//! Reelkit server binary: HTTP API, job queue and worker pool in one
//! process.

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reelkit_api::{create_router, ApiConfig, AppState};
use reelkit_media::MediaDirs;
use reelkit_queue::JobQueue;
use reelkit_store::{JobsRepo, Store, UsersRepo};
use reelkit_worker::{default_registry, HandlerContext, WorkerConfig, WorkerPool};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);
    let env_filter = EnvFilter::from_default_env()
        .add_directive("reelkit=info".parse().expect("valid directive"));
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true))
            .with(env_filter)
            .init();
    }

    info!("starting reelkit-server");
    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();

    if let Err(e) = run(config, worker_config).await {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(config: ApiConfig, worker_config: WorkerConfig) -> anyhow::Result<()> {
    // Artifact directories and store.
    std::fs::create_dir_all(&config.data_dir)?;
    let dirs = MediaDirs::under(&config.data_dir);
    dirs.ensure()?;
    let store = Store::open(config.db_path()).await?;

    // Bootstrap admin, syncing the passcode from config when present.
    UsersRepo::new(store.clone())
        .ensure_admin(&config.admin_config_path)
        .await?;

    // Queue: orphan sweep + pending rehydration, then the worker pool.
    let queue = Arc::new(JobQueue::new(JobsRepo::new(store.clone())));
    queue.start().await?;

    let ctx = Arc::new(HandlerContext::new(
        store.clone(),
        dirs.clone(),
        worker_config,
    ));
    let pool = Arc::new(WorkerPool::new(
        Arc::clone(&queue),
        Arc::clone(&ctx),
        default_registry(),
    ));
    pool.start();

    // Daily maintenance: prune old terminal jobs, refresh planner stats.
    let retention_days: u32 = std::env::var("JOB_RETENTION_DAYS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);
    let maintenance_store = store.clone();
    tokio::spawn(async move {
        let jobs = JobsRepo::new(maintenance_store.clone());
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(24 * 60 * 60));
        interval.tick().await; // first tick fires immediately; skip it
        loop {
            interval.tick().await;
            if let Err(e) = jobs.delete_old_jobs(retention_days).await {
                error!("job retention sweep failed: {e}");
            }
            if let Err(e) = maintenance_store.analyze().await {
                error!("ANALYZE failed: {e}");
            }
        }
    });

    // Metrics.
    let metrics_handle = match std::env::var("METRICS_ENABLED").as_deref() {
        Ok("false") | Ok("0") => None,
        _ => Some(
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| anyhow::anyhow!("metrics recorder: {e}"))?,
        ),
    };

    let state = AppState::new(
        config.clone(),
        store,
        dirs,
        Arc::clone(&queue),
        Arc::clone(&pool),
    );
    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("draining workers");
    pool.stop(true).await;
    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C handler");
    info!("received shutdown signal");
}
