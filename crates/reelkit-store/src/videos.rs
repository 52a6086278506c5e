//! Videos repository.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use reelkit_models::{NewVideo, Project, ProjectId, Video, VideoId};

use crate::error::{StoreError, StoreResult};
use crate::rows::{get_bool, get_datetime, now_rfc3339};
use crate::store::{SqlValue, Store};

/// Field mask for [`VideosRepo::update`]. Absent fields are left untouched;
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct UpdateVideo {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub source_url: Option<Option<String>>,
    pub duration: Option<Option<f64>>,
    pub width: Option<Option<u32>>,
    pub height: Option<Option<u32>>,
    pub size_bytes: Option<Option<u64>>,
    pub is_clip: Option<bool>,
    pub parent_video_id: Option<Option<VideoId>>,
}

/// Typed access to the `videos` table.
#[derive(Clone)]
pub struct VideosRepo {
    store: Store,
}

impl VideosRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create(&self, project_id: &ProjectId, new: NewVideo) -> StoreResult<Video> {
        let id = VideoId::new();
        let now = now_rfc3339();
        self.store
            .write(
                "INSERT INTO videos \
                 (id, project_id, title, filename, source_url, duration, width, height, \
                  size_bytes, is_clip, parent_video_id, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                &[
                    id.as_str().into(),
                    project_id.as_str().into(),
                    new.title.as_str().into(),
                    new.filename.as_str().into(),
                    new.source_url.as_deref().into(),
                    new.duration.into(),
                    new.width.into(),
                    new.height.into(),
                    new.size_bytes.map(|v| v as i64).into(),
                    new.is_clip.into(),
                    new.parent_video_id.as_ref().map(|p| p.as_str()).into(),
                    now.into(),
                ],
            )
            .await?;
        info!(video_id = %id, title = %new.title, "created video");
        self.by_id(&id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("video {id}")))
    }

    pub async fn by_id(&self, id: &VideoId) -> StoreResult<Option<Video>> {
        self.store
            .query_one(
                "SELECT * FROM videos WHERE id = ?1 AND is_deleted = 0",
                &[id.as_str().into()],
            )
            .await?
            .map(row_to_video)
            .transpose()
    }

    pub async fn by_project(
        &self,
        project: &Project,
        include_deleted: bool,
    ) -> StoreResult<Vec<Video>> {
        self.by_project_id(&project.id, include_deleted).await
    }

    pub async fn by_project_id(
        &self,
        project_id: &ProjectId,
        include_deleted: bool,
    ) -> StoreResult<Vec<Video>> {
        let sql = if include_deleted {
            "SELECT * FROM videos WHERE project_id = ?1 ORDER BY created_at DESC"
        } else {
            "SELECT * FROM videos WHERE project_id = ?1 AND is_deleted = 0 \
             ORDER BY created_at DESC"
        };
        self.store
            .query(sql, &[project_id.as_str().into()])
            .await?
            .into_iter()
            .map(row_to_video)
            .collect()
    }

    pub async fn by_filename(&self, filename: &str) -> StoreResult<Option<Video>> {
        self.store
            .query_one(
                "SELECT * FROM videos WHERE filename = ?1 AND is_deleted = 0",
                &[filename.into()],
            )
            .await?
            .map(row_to_video)
            .transpose()
    }

    /// Update allowed fields. Setting `parent_video_id` verifies the parent
    /// exists and is older than this video, keeping lineage a DAG.
    pub async fn update(&self, id: &VideoId, update: UpdateVideo) -> StoreResult<Option<Video>> {
        if let Some(Some(parent_id)) = &update.parent_video_id {
            let Some(current) = self.by_id(id).await? else {
                return Ok(None);
            };
            let parent = self
                .by_id(parent_id)
                .await?
                .ok_or_else(|| StoreError::invalid_reference(format!("parent video {parent_id}")))?;
            if parent.created_at > current.created_at {
                return Err(StoreError::invalid_reference(format!(
                    "parent video {parent_id} is newer than {id}"
                )));
            }
        }

        let mut sets: Vec<String> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        let mut push = |column: &str, value: SqlValue| {
            params.push(value);
            sets.push(format!("{column} = ?{}", params.len()));
        };

        if let Some(v) = &update.title {
            push("title", v.as_str().into());
        }
        if let Some(v) = &update.filename {
            push("filename", v.as_str().into());
        }
        if let Some(v) = &update.source_url {
            push("source_url", v.as_deref().into());
        }
        if let Some(v) = &update.duration {
            push("duration", (*v).into());
        }
        if let Some(v) = &update.width {
            push("width", v.map(|x| x as i64).into());
        }
        if let Some(v) = &update.height {
            push("height", v.map(|x| x as i64).into());
        }
        if let Some(v) = &update.size_bytes {
            push("size_bytes", v.map(|x| x as i64).into());
        }
        if let Some(v) = &update.is_clip {
            push("is_clip", (*v).into());
        }
        if let Some(v) = &update.parent_video_id {
            push("parent_video_id", v.as_ref().map(|p| p.as_str()).into());
        }

        if sets.is_empty() {
            return self.by_id(id).await;
        }
        params.push(id.as_str().into());
        let sql = format!(
            "UPDATE videos SET {} WHERE id = ?{}",
            sets.join(", "),
            params.len()
        );
        self.store.write(&sql, &params).await?;
        self.by_id(id).await
    }

    pub async fn delete(&self, id: &VideoId, hard: bool) -> StoreResult<bool> {
        let affected = if hard {
            self.store
                .write("DELETE FROM videos WHERE id = ?1", &[id.as_str().into()])
                .await?
        } else {
            self.store
                .write(
                    "UPDATE videos SET is_deleted = 1 WHERE id = ?1",
                    &[id.as_str().into()],
                )
                .await?
        };
        Ok(affected > 0)
    }

    pub async fn restore(&self, id: &VideoId) -> StoreResult<Option<Video>> {
        self.store
            .write(
                "UPDATE videos SET is_deleted = 0 WHERE id = ?1",
                &[id.as_str().into()],
            )
            .await?;
        self.by_id(id).await
    }

    /// Bulk soft-delete. Returns the number of rows flagged.
    pub async fn delete_many(&self, ids: &[VideoId]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "UPDATE videos SET is_deleted = 1 WHERE id IN ({})",
            placeholders.join(", ")
        );
        let params: Vec<SqlValue> = ids.iter().map(|id| id.as_str().into()).collect();
        let affected = self.store.write(&sql, &params).await?;
        info!(count = affected, "bulk soft-deleted videos");
        Ok(affected)
    }
}

fn row_to_video(row: SqliteRow) -> StoreResult<Video> {
    Ok(Video {
        id: VideoId::from_string(row.try_get::<String, _>("id")?),
        project_id: ProjectId::from_string(row.try_get::<String, _>("project_id")?),
        title: row.try_get("title")?,
        filename: row.try_get("filename")?,
        source_url: row.try_get("source_url")?,
        duration: row.try_get("duration")?,
        width: row.try_get::<Option<i64>, _>("width")?.map(|v| v as u32),
        height: row.try_get::<Option<i64>, _>("height")?.map(|v| v as u32),
        size_bytes: row
            .try_get::<Option<i64>, _>("size_bytes")?
            .map(|v| v as u64),
        is_clip: get_bool(&row, "is_clip")?,
        parent_video_id: row
            .try_get::<Option<String>, _>("parent_video_id")?
            .map(VideoId::from_string),
        created_at: get_datetime(&row, "created_at")?,
        updated_at: get_datetime(&row, "updated_at")?,
        is_deleted: get_bool(&row, "is_deleted")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projects::ProjectsRepo;

    async fn fixture() -> (Store, ProjectId) {
        let store = Store::open_in_memory().await.unwrap();
        let project = ProjectsRepo::new(store.clone())
            .create("p", None, None)
            .await
            .unwrap();
        (store, project.id)
    }

    #[tokio::test]
    async fn lineage_survives_parent_soft_delete() {
        let (store, project_id) = fixture().await;
        let repo = VideosRepo::new(store);

        let source = repo
            .create(&project_id, NewVideo::new("source", "src.mp4"))
            .await
            .unwrap();
        let clip = repo
            .create(
                &project_id,
                NewVideo::new("Clip 1", "src_clip_1.mp4").as_clip_of(source.id.clone()),
            )
            .await
            .unwrap();
        assert!(clip.is_clip);

        repo.delete(&source.id, false).await.unwrap();
        let clip = repo.by_id(&clip.id).await.unwrap().unwrap();
        assert_eq!(clip.parent_video_id, Some(source.id));
    }

    #[tokio::test]
    async fn hard_delete_nulls_lineage_pointers() {
        let (store, project_id) = fixture().await;
        let repo = VideosRepo::new(store);

        let source = repo
            .create(&project_id, NewVideo::new("source", "src.mp4"))
            .await
            .unwrap();
        let clip = repo
            .create(
                &project_id,
                NewVideo::new("Clip 1", "src_clip_1.mp4").as_clip_of(source.id.clone()),
            )
            .await
            .unwrap();

        repo.delete(&source.id, true).await.unwrap();
        let clip = repo.by_id(&clip.id).await.unwrap().unwrap();
        assert_eq!(clip.parent_video_id, None);
    }

    #[tokio::test]
    async fn soft_deleted_videos_are_invisible() {
        let (store, project_id) = fixture().await;
        let repo = VideosRepo::new(store);

        let a = repo
            .create(&project_id, NewVideo::new("a", "a.mp4"))
            .await
            .unwrap();
        repo.create(&project_id, NewVideo::new("b", "b.mp4"))
            .await
            .unwrap();

        repo.delete_many(&[a.id.clone()]).await.unwrap();

        let visible = repo.by_project_id(&project_id, false).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert!(visible.iter().all(|v| !v.is_deleted));
        assert!(repo.by_filename("a.mp4").await.unwrap().is_none());

        let all = repo.by_project_id(&project_id, true).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn update_rejects_newer_parent() {
        let (store, project_id) = fixture().await;
        let repo = VideosRepo::new(store);

        let older = repo
            .create(&project_id, NewVideo::new("older", "older.mp4"))
            .await
            .unwrap();
        // Force a later created_at on the would-be parent.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = repo
            .create(&project_id, NewVideo::new("newer", "newer.mp4"))
            .await
            .unwrap();

        let result = repo
            .update(
                &older.id,
                UpdateVideo {
                    parent_video_id: Some(Some(newer.id.clone())),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::InvalidReference(_))));

        let ok = repo
            .update(
                &newer.id,
                UpdateVideo {
                    parent_video_id: Some(Some(older.id.clone())),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ok.parent_video_id, Some(older.id));
    }
}
