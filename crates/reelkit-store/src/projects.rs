//! Projects repository.

use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::info;

use reelkit_models::{Project, ProjectId, UserId};

use crate::error::StoreResult;
use crate::rows::{get_bool, get_datetime, now_rfc3339};
use crate::store::{SqlValue, Store};

/// Typed access to the `projects` table.
#[derive(Clone)]
pub struct ProjectsRepo {
    store: Store,
}

impl ProjectsRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        name: &str,
        user_id: Option<&UserId>,
        description: Option<&str>,
    ) -> StoreResult<Project> {
        let id = ProjectId::new();
        let now = now_rfc3339();
        self.store
            .write(
                "INSERT INTO projects (id, user_id, name, description, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                &[
                    id.as_str().into(),
                    user_id.map(|u| u.as_str()).into(),
                    name.into(),
                    description.into(),
                    now.into(),
                ],
            )
            .await?;
        info!(project_id = %id, "created project");
        self.require(&id).await
    }

    pub async fn by_id(&self, id: &ProjectId) -> StoreResult<Option<Project>> {
        self.store
            .query_one(
                "SELECT * FROM projects WHERE id = ?1 AND is_deleted = 0",
                &[id.as_str().into()],
            )
            .await?
            .map(row_to_project)
            .transpose()
    }

    async fn require(&self, id: &ProjectId) -> StoreResult<Project> {
        self.by_id(id)
            .await?
            .ok_or_else(|| crate::StoreError::not_found(format!("project {id}")))
    }

    pub async fn list(
        &self,
        user_id: Option<&UserId>,
        include_deleted: bool,
    ) -> StoreResult<Vec<Project>> {
        let mut sql = String::from("SELECT * FROM projects WHERE 1=1");
        let mut params: Vec<SqlValue> = Vec::new();
        if !include_deleted {
            sql.push_str(" AND is_deleted = 0");
        }
        if let Some(uid) = user_id {
            params.push(uid.as_str().into());
            sql.push_str(&format!(" AND user_id = ?{}", params.len()));
        }
        sql.push_str(" ORDER BY created_at DESC");

        self.store
            .query(&sql, &params)
            .await?
            .into_iter()
            .map(row_to_project)
            .collect()
    }

    /// Update the allowed fields (name, description).
    pub async fn update(
        &self,
        id: &ProjectId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> StoreResult<Option<Project>> {
        let mut sets: Vec<String> = Vec::new();
        let mut params: Vec<SqlValue> = Vec::new();
        if let Some(name) = name {
            params.push(name.into());
            sets.push(format!("name = ?{}", params.len()));
        }
        if let Some(description) = description {
            params.push(description.into());
            sets.push(format!("description = ?{}", params.len()));
        }
        if sets.is_empty() {
            return self.by_id(id).await;
        }
        params.push(id.as_str().into());
        let sql = format!(
            "UPDATE projects SET {} WHERE id = ?{}",
            sets.join(", "),
            params.len()
        );
        self.store.write(&sql, &params).await?;
        self.by_id(id).await
    }

    /// Soft-delete by default; `hard` removes the row and cascades.
    pub async fn delete(&self, id: &ProjectId, hard: bool) -> StoreResult<bool> {
        let affected = if hard {
            self.store
                .write("DELETE FROM projects WHERE id = ?1", &[id.as_str().into()])
                .await?
        } else {
            self.store
                .write(
                    "UPDATE projects SET is_deleted = 1 WHERE id = ?1",
                    &[id.as_str().into()],
                )
                .await?
        };
        Ok(affected > 0)
    }

    pub async fn restore(&self, id: &ProjectId) -> StoreResult<Option<Project>> {
        self.store
            .write(
                "UPDATE projects SET is_deleted = 0 WHERE id = ?1",
                &[id.as_str().into()],
            )
            .await?;
        self.by_id(id).await
    }
}

fn row_to_project(row: SqliteRow) -> StoreResult<Project> {
    Ok(Project {
        id: ProjectId::from_string(row.try_get::<String, _>("id")?),
        user_id: row
            .try_get::<Option<String>, _>("user_id")?
            .map(UserId::from_string),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        created_at: get_datetime(&row, "created_at")?,
        updated_at: get_datetime(&row, "updated_at")?,
        is_deleted: get_bool(&row, "is_deleted")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn soft_delete_then_restore_round_trips() {
        let store = Store::open_in_memory().await.unwrap();
        let repo = ProjectsRepo::new(store);

        let project = repo.create("shorts", None, Some("weekly cuts")).await.unwrap();

        assert!(repo.delete(&project.id, false).await.unwrap());
        assert!(repo.by_id(&project.id).await.unwrap().is_none());
        assert_eq!(repo.list(None, false).await.unwrap().len(), 0);
        assert_eq!(repo.list(None, true).await.unwrap().len(), 1);

        let restored = repo.restore(&project.id).await.unwrap().unwrap();
        assert_eq!(restored.name, project.name);
        assert_eq!(restored.description, project.description);
        assert_eq!(restored.created_at, project.created_at);
    }

    #[tokio::test]
    async fn update_gates_fields() {
        let store = Store::open_in_memory().await.unwrap();
        let repo = ProjectsRepo::new(store);

        let project = repo.create("a", None, None).await.unwrap();
        let updated = repo
            .update(&project.id, Some("b"), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "b");
        assert!(updated.description.is_none());

        // No fields: a no-op read-back.
        let same = repo.update(&project.id, None, None).await.unwrap().unwrap();
        assert_eq!(same.name, "b");
    }
}
