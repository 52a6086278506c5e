//! Jobs repository.
//!
//! `update_status` is the single path for status/progress/timestamp
//! mutations; `retry` is the only transition that reopens a terminal job.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use reelkit_models::{Job, JobId, JobStatus, JobType, ProjectId, VideoId, DEFAULT_MAX_RETRIES};

use crate::error::{StoreError, StoreResult};
use crate::rows::{get_datetime, get_json_object, get_opt_datetime, now_rfc3339};
use crate::store::{SqlValue, Store};

/// Optional fields accompanying a status transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusUpdate<'a> {
    pub progress: Option<u8>,
    pub error_message: Option<&'a str>,
    pub output: Option<&'a serde_json::Value>,
}

/// Typed access to the `jobs` table.
#[derive(Clone)]
pub struct JobsRepo {
    store: Store,
}

impl JobsRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        job_type: JobType,
        project_id: Option<&ProjectId>,
        video_id: Option<&VideoId>,
        input_data: &serde_json::Value,
        priority: i64,
        max_retries: Option<u32>,
    ) -> StoreResult<Job> {
        let id = JobId::new();
        let now = now_rfc3339();
        self.store
            .write(
                "INSERT INTO jobs \
                 (id, type, status, priority, project_id, video_id, input_data, \
                  max_retries, created_at, updated_at) \
                 VALUES (?1, ?2, 'pending', ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                &[
                    id.as_str().into(),
                    job_type.as_str().into(),
                    priority.into(),
                    project_id.map(|p| p.as_str()).into(),
                    video_id.map(|v| v.as_str()).into(),
                    serde_json::to_string(input_data)?.into(),
                    max_retries.unwrap_or(DEFAULT_MAX_RETRIES).into(),
                    now.into(),
                ],
            )
            .await?;
        info!(job_id = %id, job_type = %job_type, priority, "created job");
        self.by_id(&id)
            .await?
            .ok_or_else(|| StoreError::not_found(format!("job {id}")))
    }

    pub async fn by_id(&self, id: &JobId) -> StoreResult<Option<Job>> {
        self.store
            .query_one("SELECT * FROM jobs WHERE id = ?1", &[id.as_str().into()])
            .await?
            .map(row_to_job)
            .transpose()
    }

    /// Pending jobs ordered by priority (highest first), FIFO within a tier.
    pub async fn pending_jobs(&self, limit: Option<u32>) -> StoreResult<Vec<Job>> {
        let mut sql = String::from(
            "SELECT * FROM jobs WHERE status = 'pending' \
             ORDER BY priority DESC, created_at ASC",
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        self.store
            .query(&sql, &[])
            .await?
            .into_iter()
            .map(row_to_job)
            .collect()
    }

    /// Jobs still marked running; after a restart these are orphans.
    pub async fn running_jobs(&self) -> StoreResult<Vec<Job>> {
        self.by_status(JobStatus::Running).await
    }

    pub async fn by_status(&self, status: JobStatus) -> StoreResult<Vec<Job>> {
        self.store
            .query(
                "SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at DESC",
                &[status.as_str().into()],
            )
            .await?
            .into_iter()
            .map(row_to_job)
            .collect()
    }

    pub async fn by_project(&self, project_id: &ProjectId) -> StoreResult<Vec<Job>> {
        self.store
            .query(
                "SELECT * FROM jobs WHERE project_id = ?1 ORDER BY created_at DESC",
                &[project_id.as_str().into()],
            )
            .await?
            .into_iter()
            .map(row_to_job)
            .collect()
    }

    pub async fn list_recent(&self, limit: u32) -> StoreResult<Vec<Job>> {
        self.store
            .query(
                &format!("SELECT * FROM jobs ORDER BY created_at DESC LIMIT {limit}"),
                &[],
            )
            .await?
            .into_iter()
            .map(row_to_job)
            .collect()
    }

    /// Transition a job's status, maintaining lifecycle timestamps.
    ///
    /// `started_at` is set on the first transition to running and
    /// `completed_at` on the first terminal transition. A transition to
    /// running is refused once the job is terminal, so a straggling progress
    /// write cannot resurrect a cancelled job. Output objects are merged
    /// key-by-key into the existing `output_data`.
    pub async fn update_status(
        &self,
        id: &JobId,
        status: JobStatus,
        update: StatusUpdate<'_>,
    ) -> StoreResult<Option<Job>> {
        let _guard = self.store.lock_writes().await;

        let mut sets: Vec<String> = vec![];
        let mut params: Vec<SqlValue> = vec![];
        let mut push = |fragment: &str, value: SqlValue| {
            params.push(value);
            format!("{fragment}?{}", params.len())
        };

        sets.push(push("status = ", status.as_str().into()));

        if let Some(progress) = update.progress {
            sets.push(push("progress = ", (progress.min(100) as i64).into()));
        }
        if let Some(error) = update.error_message {
            sets.push(push("error_message = ", error.into()));
        }
        if let Some(output) = update.output {
            let merged = self.merged_output(id, output).await?;
            sets.push(push("output_data = ", serde_json::to_string(&merged)?.into()));
        }

        let now = now_rfc3339();
        match status {
            JobStatus::Running => {
                sets.push(push("started_at = COALESCE(started_at, ", now.into()) + ")");
            }
            s if s.is_terminal() => {
                sets.push(push("completed_at = COALESCE(completed_at, ", now.into()) + ")");
            }
            _ => {}
        }

        let guard_clause = if status == JobStatus::Running {
            " AND status IN ('pending', 'running')"
        } else {
            ""
        };
        params.push(id.as_str().into());
        let sql = format!(
            "UPDATE jobs SET {} WHERE id = ?{}{}",
            sets.join(", "),
            params.len(),
            guard_clause
        );
        self.store.write_locked(&sql, &params).await?;
        drop(_guard);
        self.by_id(id).await
    }

    async fn merged_output(
        &self,
        id: &JobId,
        new: &serde_json::Value,
    ) -> StoreResult<serde_json::Value> {
        let current = self
            .store
            .query_one(
                "SELECT output_data FROM jobs WHERE id = ?1",
                &[id.as_str().into()],
            )
            .await?
            .map(|row| get_json_object(&row, "output_data"))
            .transpose()?
            .unwrap_or_else(|| serde_json::Value::Object(Default::default()));

        match (current, new) {
            (serde_json::Value::Object(mut base), serde_json::Value::Object(add)) => {
                for (k, v) in add {
                    base.insert(k.clone(), v.clone());
                }
                Ok(serde_json::Value::Object(base))
            }
            // Non-object payloads replace wholesale.
            (_, other) => Ok(other.clone()),
        }
    }

    /// Cancel a non-terminal job. Returns false when already terminal.
    pub async fn cancel(&self, id: &JobId) -> StoreResult<bool> {
        let affected = self
            .store
            .write(
                "UPDATE jobs SET status = 'cancelled', \
                 completed_at = COALESCE(completed_at, ?1) \
                 WHERE id = ?2 AND status IN ('pending', 'running')",
                &[now_rfc3339().into(), id.as_str().into()],
            )
            .await?;
        if affected > 0 {
            info!(job_id = %id, "cancelled job");
        }
        Ok(affected > 0)
    }

    /// Move a job back to pending, consuming one retry slot. Returns false
    /// when the budget is exhausted.
    pub async fn retry(&self, id: &JobId) -> StoreResult<bool> {
        let affected = self
            .store
            .write(
                "UPDATE jobs SET status = 'pending', retry_count = retry_count + 1, \
                 error_message = NULL, progress = 0 \
                 WHERE id = ?1 AND retry_count < max_retries",
                &[id.as_str().into()],
            )
            .await?;
        if affected > 0 {
            info!(job_id = %id, "job queued for retry");
        }
        Ok(affected > 0)
    }

    pub async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        let affected = self
            .store
            .write("DELETE FROM jobs WHERE id = ?1", &[id.as_str().into()])
            .await?;
        Ok(affected > 0)
    }

    /// Prune completed/failed jobs whose terminal transition is older than
    /// `days`. Returns the number deleted.
    pub async fn delete_old_jobs(&self, days: u32) -> StoreResult<u64> {
        let deleted = self
            .store
            .write(
                "DELETE FROM jobs WHERE status IN ('completed', 'failed') \
                 AND DATETIME(completed_at) < DATETIME('now', ?1)",
                &[format!("-{days} days").into()],
            )
            .await?;
        info!(deleted, "pruned old jobs");
        Ok(deleted)
    }
}

fn row_to_job(row: SqliteRow) -> StoreResult<Job> {
    let job_type: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;
    Ok(Job {
        id: JobId::from_string(row.try_get::<String, _>("id")?),
        job_type: job_type
            .parse::<JobType>()
            .map_err(|e| StoreError::corrupt("type", e.to_string()))?,
        status: status
            .parse::<JobStatus>()
            .map_err(|e| StoreError::corrupt("status", e.to_string()))?,
        priority: row.try_get("priority")?,
        project_id: row
            .try_get::<Option<String>, _>("project_id")?
            .map(ProjectId::from_string),
        video_id: row
            .try_get::<Option<String>, _>("video_id")?
            .map(VideoId::from_string),
        input_data: get_json_object(&row, "input_data")?,
        output_data: get_json_object(&row, "output_data")?,
        progress: row.try_get::<i64, _>("progress")?.clamp(0, 100) as u8,
        error_message: row.try_get("error_message")?,
        retry_count: row.try_get::<i64, _>("retry_count")? as u32,
        max_retries: row.try_get::<i64, _>("max_retries")? as u32,
        created_at: get_datetime(&row, "created_at")?,
        started_at: get_opt_datetime(&row, "started_at")?,
        completed_at: get_opt_datetime(&row, "completed_at")?,
        updated_at: get_datetime(&row, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn repo() -> JobsRepo {
        JobsRepo::new(Store::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn lifecycle_timestamps() {
        let repo = repo().await;
        let job = repo
            .create(JobType::Trim, None, None, &json!({}), 0, None)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.started_at.is_none());

        let running = repo
            .update_status(
                &job.id,
                JobStatus::Running,
                StatusUpdate {
                    progress: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert!(running.started_at.is_some());
        assert!(running.completed_at.is_none());

        let done = repo
            .update_status(
                &job.id,
                JobStatus::Completed,
                StatusUpdate {
                    progress: Some(100),
                    output: Some(&json!({"filename": "out.mp4"})),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.progress, 100);
        assert!(done.completed_at.is_some());
        assert_eq!(done.output_data["filename"], "out.mp4");
    }

    #[tokio::test]
    async fn output_merges_instead_of_replacing() {
        let repo = repo().await;
        let job = repo
            .create(JobType::Caption, None, None, &json!({}), 0, None)
            .await
            .unwrap();

        repo.update_status(
            &job.id,
            JobStatus::Running,
            StatusUpdate {
                output: Some(&json!({"progress_message": "transcribing"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let done = repo
            .update_status(
                &job.id,
                JobStatus::Completed,
                StatusUpdate {
                    output: Some(&json!({"caption_id": "c1"})),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.output_data["progress_message"], "transcribing");
        assert_eq!(done.output_data["caption_id"], "c1");
    }

    #[tokio::test]
    async fn retry_caps_at_max_retries() {
        let repo = repo().await;
        let job = repo
            .create(JobType::Download, None, None, &json!({}), 0, Some(2))
            .await
            .unwrap();

        repo.update_status(&job.id, JobStatus::Failed, StatusUpdate::default())
            .await
            .unwrap();

        assert!(repo.retry(&job.id).await.unwrap());
        assert!(repo.retry(&job.id).await.unwrap());
        assert!(!repo.retry(&job.id).await.unwrap());

        let job = repo.by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(job.retry_count, 2);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error_message.is_none());
        assert_eq!(job.progress, 0);
    }

    #[tokio::test]
    async fn cancel_only_from_non_terminal() {
        let repo = repo().await;
        let job = repo
            .create(JobType::SplitFixed, None, None, &json!({}), 0, None)
            .await
            .unwrap();

        assert!(repo.cancel(&job.id).await.unwrap());
        let job = repo.by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        // Cancelled straight from pending: no started_at, completed_at set.
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_some());

        assert!(!repo.cancel(&job.id).await.unwrap());
    }

    #[tokio::test]
    async fn running_transition_cannot_reopen_terminal_job() {
        let repo = repo().await;
        let job = repo
            .create(JobType::Burn, None, None, &json!({}), 0, None)
            .await
            .unwrap();
        repo.cancel(&job.id).await.unwrap();

        // A straggling progress write must not flip the job back to running.
        let after = repo
            .update_status(
                &job.id,
                JobStatus::Running,
                StatusUpdate {
                    progress: Some(50),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn pending_jobs_order_by_priority_then_fifo() {
        let repo = repo().await;
        let a = repo
            .create(JobType::Caption, None, None, &json!({}), 0, None)
            .await
            .unwrap();
        let b = repo
            .create(JobType::Caption, None, None, &json!({}), 5, None)
            .await
            .unwrap();
        let c = repo
            .create(JobType::Caption, None, None, &json!({}), 0, None)
            .await
            .unwrap();

        let pending = repo.pending_jobs(None).await.unwrap();
        let ids: Vec<_> = pending.iter().map(|j| j.id.clone()).collect();
        assert_eq!(ids, vec![b.id, a.id, c.id]);
    }
}
