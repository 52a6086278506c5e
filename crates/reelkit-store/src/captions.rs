//! Captions repository.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use reelkit_models::{Caption, CaptionFormat, CaptionId, CaptionStyle, VideoId};

use crate::error::{StoreError, StoreResult};
use crate::rows::{get_bool, get_datetime, now_rfc3339};
use crate::store::{SqlValue, Store};

/// Typed access to the `captions` table.
#[derive(Clone)]
pub struct CaptionsRepo {
    store: Store,
}

impl CaptionsRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        video_id: &VideoId,
        filename: &str,
        language: &str,
        format: CaptionFormat,
        style: Option<&CaptionStyle>,
    ) -> StoreResult<Caption> {
        let id = CaptionId::new();
        let now = now_rfc3339();
        let style_json = style.map(serde_json::to_string).transpose()?;
        self.store
            .write(
                "INSERT INTO captions (id, video_id, filename, language, format, style, \
                 created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                &[
                    id.as_str().into(),
                    video_id.as_str().into(),
                    filename.into(),
                    language.into(),
                    format.as_str().into(),
                    style_json.into(),
                    now.into(),
                ],
            )
            .await?;
        info!(caption_id = %id, video_id = %video_id, "created caption");
        self.by_id(&id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("caption {id}")))
    }

    pub async fn by_id(&self, id: &CaptionId) -> StoreResult<Option<Caption>> {
        self.store
            .query_one(
                "SELECT * FROM captions WHERE id = ?1 AND is_deleted = 0",
                &[id.as_str().into()],
            )
            .await?
            .map(row_to_caption)
            .transpose()
    }

    pub async fn by_filename(&self, filename: &str) -> StoreResult<Option<Caption>> {
        self.store
            .query_one(
                "SELECT * FROM captions WHERE filename = ?1 AND is_deleted = 0",
                &[filename.into()],
            )
            .await?
            .map(row_to_caption)
            .transpose()
    }

    /// Captions for a video, newest first.
    pub async fn by_video(&self, video_id: &VideoId) -> StoreResult<Vec<Caption>> {
        self.store
            .query(
                "SELECT * FROM captions WHERE video_id = ?1 AND is_deleted = 0 \
                 ORDER BY created_at DESC",
                &[video_id.as_str().into()],
            )
            .await?
            .into_iter()
            .map(row_to_caption)
            .collect()
    }

    pub async fn update(
        &self,
        id: &CaptionId,
        filename: Option<&str>,
        language: Option<&str>,
        format: Option<CaptionFormat>,
        style: Option<&CaptionStyle>,
    ) -> StoreResult<Option<Caption>> {
        let mut sets: Vec<String> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        let mut push = |column: &str, value: SqlValue| {
            params.push(value);
            sets.push(format!("{column} = ?{}", params.len()));
        };

        if let Some(v) = filename {
            push("filename", v.into());
        }
        if let Some(v) = language {
            push("language", v.into());
        }
        if let Some(v) = format {
            push("format", v.as_str().into());
        }
        if let Some(v) = style {
            push("style", serde_json::to_string(v)?.into());
        }
        if sets.is_empty() {
            return self.by_id(id).await;
        }
        params.push(id.as_str().into());
        let sql = format!(
            "UPDATE captions SET {} WHERE id = ?{}",
            sets.join(", "),
            params.len()
        );
        self.store.write(&sql, &params).await?;
        self.by_id(id).await
    }

    pub async fn delete(&self, id: &CaptionId, hard: bool) -> StoreResult<bool> {
        let affected = if hard {
            self.store
                .write("DELETE FROM captions WHERE id = ?1", &[id.as_str().into()])
                .await?
        } else {
            self.store
                .write(
                    "UPDATE captions SET is_deleted = 1 WHERE id = ?1",
                    &[id.as_str().into()],
                )
                .await?
        };
        Ok(affected > 0)
    }
}

fn row_to_caption(row: SqliteRow) -> StoreResult<Caption> {
    let format: String = row.try_get("format")?;
    let style: Option<String> = row.try_get("style")?;
    Ok(Caption {
        id: CaptionId::from_string(row.try_get::<String, _>("id")?),
        video_id: VideoId::from_string(row.try_get::<String, _>("video_id")?),
        filename: row.try_get("filename")?,
        language: row.try_get("language")?,
        format: format
            .parse()
            .map_err(|e: String| StoreError::corrupt("format", e))?,
        style: style.map(|s| serde_json::from_str(&s)).transpose()?,
        created_at: get_datetime(&row, "created_at")?,
        updated_at: get_datetime(&row, "updated_at")?,
        is_deleted: get_bool(&row, "is_deleted")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projects::ProjectsRepo;
    use crate::videos::VideosRepo;
    use reelkit_models::NewVideo;

    #[tokio::test]
    async fn newest_caption_first_and_style_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        let project = ProjectsRepo::new(store.clone())
            .create("p", None, None)
            .await
            .unwrap();
        let video = VideosRepo::new(store.clone())
            .create(&project.id, NewVideo::new("v", "v.mp4"))
            .await
            .unwrap();
        let repo = CaptionsRepo::new(store);

        let style = CaptionStyle {
            font_size: Some(32),
            primary_color: Some("#ffffff".into()),
            ..Default::default()
        };
        repo.create(&video.id, "v.srt", "en", CaptionFormat::Srt, None)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = repo
            .create(&video.id, "v2.srt", "en", CaptionFormat::Srt, Some(&style))
            .await
            .unwrap();

        let captions = repo.by_video(&video.id).await.unwrap();
        assert_eq!(captions.len(), 2);
        assert_eq!(captions[0].id, newer.id);
        assert_eq!(captions[0].style.as_ref().unwrap().font_size, Some(32));
    }
}
