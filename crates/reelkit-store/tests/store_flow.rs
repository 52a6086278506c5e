//! Cross-repository flows against an in-memory store.

use serde_json::json;

use reelkit_models::{CaptionFormat, JobStatus, JobType, NewVideo, Role};
use reelkit_store::{
    CaptionsRepo, JobsRepo, ProjectsRepo, SettingsRepo, StatusUpdate, Store, UsersRepo, VideosRepo,
};

struct Fixture {
    users: UsersRepo,
    projects: ProjectsRepo,
    videos: VideosRepo,
    captions: CaptionsRepo,
    jobs: JobsRepo,
    settings: SettingsRepo,
}

async fn fixture() -> Fixture {
    let store = Store::open_in_memory().await.unwrap();
    Fixture {
        users: UsersRepo::new(store.clone()),
        projects: ProjectsRepo::new(store.clone()),
        videos: VideosRepo::new(store.clone()),
        captions: CaptionsRepo::new(store.clone()),
        jobs: JobsRepo::new(store.clone()),
        settings: SettingsRepo::new(store),
    }
}

#[tokio::test]
async fn full_pipeline_rows_compose() {
    let f = fixture().await;

    let user = f
        .users
        .create("creator", "pass-1", Role::User)
        .await
        .unwrap()
        .unwrap();
    let project = f
        .projects
        .create("shorts", Some(&user.id), None)
        .await
        .unwrap();

    // Source video registered by a download job.
    let source = f
        .videos
        .create(
            &project.id,
            NewVideo::new("Launch day", "abc.mp4")
                .with_source_url("https://example.com/launch.mp4")
                .with_size_bytes(Some(1_048_576)),
        )
        .await
        .unwrap();

    // Caption, then a burned derivative pointing back at the source.
    let caption = f
        .captions
        .create(&source.id, "abc.srt", "en", CaptionFormat::Srt, None)
        .await
        .unwrap();
    let burned = f
        .videos
        .create(
            &project.id,
            NewVideo::new("Launch day (Captioned)", "burned_x_abc.mp4")
                .with_parent(source.id.clone()),
        )
        .await
        .unwrap();

    assert_eq!(burned.parent_video_id.as_ref(), Some(&source.id));
    assert_eq!(f.captions.by_video(&source.id).await.unwrap().len(), 1);
    assert_eq!(caption.video_id, source.id);

    // Jobs scoped to the project show up in its history.
    let job = f
        .jobs
        .create(
            JobType::Burn,
            Some(&project.id),
            Some(&source.id),
            &json!({"caption_id": caption.id}),
            0,
            None,
        )
        .await
        .unwrap();
    let history = f.jobs.by_project(&project.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, job.id);
}

#[tokio::test]
async fn job_state_machine_and_telemetry() {
    let f = fixture().await;

    let job = f
        .jobs
        .create(JobType::Download, None, None, &json!({"url": "u"}), 3, None)
        .await
        .unwrap();

    // pending -> running -> failed -> (retry) -> pending -> running -> completed
    f.jobs
        .update_status(
            &job.id,
            JobStatus::Running,
            StatusUpdate {
                progress: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    f.jobs
        .update_status(
            &job.id,
            JobStatus::Failed,
            StatusUpdate {
                error_message: Some("network down"),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(f.jobs.retry(&job.id).await.unwrap());

    let retried = f.jobs.by_id(&job.id).await.unwrap().unwrap();
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.retry_count, 1);
    assert_eq!(retried.progress, 0);
    assert!(retried.error_message.is_none());
    // First-run timestamp survives the retry.
    assert!(retried.started_at.is_some());

    f.jobs
        .update_status(
            &job.id,
            JobStatus::Running,
            StatusUpdate {
                progress: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let done = f
        .jobs
        .update_status(
            &job.id,
            JobStatus::Completed,
            StatusUpdate {
                progress: Some(100),
                output: Some(&json!({"filename": "abc.mp4"})),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn settings_round_trip_arbitrary_json() {
    let f = fixture().await;

    let value = json!({
        "nested": {"list": [1, 2.5, "three", null, true]},
        "unknown_future_field": {"kept": "verbatim"}
    });
    f.settings.set("pipeline", &value, None).await.unwrap();
    assert_eq!(f.settings.get("pipeline").await.unwrap().unwrap(), value);
}

#[tokio::test]
async fn hard_delete_project_cascades() {
    let f = fixture().await;

    let project = f.projects.create("doomed", None, None).await.unwrap();
    let video = f
        .videos
        .create(&project.id, NewVideo::new("v", "v.mp4"))
        .await
        .unwrap();
    f.captions
        .create(&video.id, "v.srt", "en", CaptionFormat::Srt, None)
        .await
        .unwrap();
    f.jobs
        .create(
            JobType::Caption,
            Some(&project.id),
            Some(&video.id),
            &json!({}),
            0,
            None,
        )
        .await
        .unwrap();

    f.projects.delete(&project.id, true).await.unwrap();

    assert!(f.videos.by_id(&video.id).await.unwrap().is_none());
    assert!(f.captions.by_video(&video.id).await.unwrap().is_empty());
    assert!(f
        .jobs
        .by_project(&project.id)
        .await
        .unwrap()
        .is_empty());
}
