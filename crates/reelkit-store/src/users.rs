//! Users repository.

use std::path::Path;

use serde::Deserialize;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{info, warn};

use reelkit_models::{Role, User, UserId};

use crate::error::{StoreError, StoreResult};
use crate::rows::{get_bool, get_datetime, now_rfc3339};
use crate::store::Store;

/// Fallback admin passcode when no config file is present.
const DEFAULT_ADMIN_PASSCODE: &str = "admin";

/// Shape of the optional `admin_config.json` file.
#[derive(Debug, Deserialize)]
struct AdminConfig {
    admin_passcode: Option<String>,
}

/// Typed access to the `users` table.
#[derive(Clone)]
pub struct UsersRepo {
    store: Store,
}

impl UsersRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Create a user. Returns `None` when the username or passcode is
    /// already taken.
    pub async fn create(
        &self,
        username: &str,
        passcode: &str,
        role: Role,
    ) -> StoreResult<Option<User>> {
        let id = UserId::new();
        let now = now_rfc3339();
        let result = self
            .store
            .write(
                "INSERT INTO users (id, username, passcode, role, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                &[
                    id.as_str().into(),
                    username.into(),
                    passcode.into(),
                    role.as_str().into(),
                    now.into(),
                ],
            )
            .await;

        match result {
            Ok(_) => self.by_id(&id).await,
            Err(StoreError::Database(e)) if StoreError::is_unique_violation(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn by_id(&self, id: &UserId) -> StoreResult<Option<User>> {
        self.store
            .query_one(
                "SELECT * FROM users WHERE id = ?1 AND is_deleted = 0",
                &[id.as_str().into()],
            )
            .await?
            .map(row_to_user)
            .transpose()
    }

    pub async fn list(&self) -> StoreResult<Vec<User>> {
        self.store
            .query(
                "SELECT * FROM users WHERE is_deleted = 0 ORDER BY created_at ASC",
                &[],
            )
            .await?
            .into_iter()
            .map(row_to_user)
            .collect()
    }

    pub async fn delete(&self, id: &UserId) -> StoreResult<bool> {
        let affected = self
            .store
            .write(
                "UPDATE users SET is_deleted = 1 WHERE id = ?1",
                &[id.as_str().into()],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn by_passcode(&self, passcode: &str) -> StoreResult<Option<User>> {
        self.store
            .query_one(
                "SELECT * FROM users WHERE passcode = ?1 AND is_deleted = 0",
                &[passcode.into()],
            )
            .await?
            .map(row_to_user)
            .transpose()
    }

    /// Guarantee the bootstrap admin user exists, syncing its passcode from
    /// the optional config file on every startup.
    pub async fn ensure_admin(&self, config_path: impl AsRef<Path>) -> StoreResult<User> {
        let passcode = read_admin_passcode(config_path.as_ref());

        let existing = self
            .store
            .query_one("SELECT * FROM users WHERE username = 'admin'", &[])
            .await?
            .map(row_to_user)
            .transpose()?;

        match existing {
            None => {
                let created = self.create("admin", &passcode, Role::Admin).await?;
                let user = created.ok_or_else(|| {
                    StoreError::invalid_reference("admin passcode already in use by another user")
                })?;
                info!("created bootstrap admin user");
                Ok(user)
            }
            Some(user) if user.passcode != passcode => {
                self.store
                    .write(
                        "UPDATE users SET passcode = ?1 WHERE username = 'admin'",
                        &[passcode.as_str().into()],
                    )
                    .await?;
                info!("synced admin passcode from config");
                Ok(User { passcode, ..user })
            }
            Some(user) => Ok(user),
        }
    }
}

fn read_admin_passcode(path: &Path) -> String {
    if !path.exists() {
        return DEFAULT_ADMIN_PASSCODE.to_string();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str::<AdminConfig>(&contents) {
            Ok(config) => config
                .admin_passcode
                .unwrap_or_else(|| DEFAULT_ADMIN_PASSCODE.to_string()),
            Err(e) => {
                warn!("ignoring malformed {}: {e}", path.display());
                DEFAULT_ADMIN_PASSCODE.to_string()
            }
        },
        Err(e) => {
            warn!("could not read {}: {e}", path.display());
            DEFAULT_ADMIN_PASSCODE.to_string()
        }
    }
}

fn row_to_user(row: SqliteRow) -> StoreResult<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId::from_string(row.try_get::<String, _>("id")?),
        username: row.try_get("username")?,
        passcode: row.try_get("passcode")?,
        role: role
            .parse()
            .map_err(|e: String| StoreError::corrupt("role", e))?,
        created_at: get_datetime(&row, "created_at")?,
        updated_at: get_datetime(&row, "updated_at")?,
        is_deleted: get_bool(&row, "is_deleted")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_passcode_returns_none() {
        let store = Store::open_in_memory().await.unwrap();
        let repo = UsersRepo::new(store);

        let first = repo.create("alice", "s3cret", Role::User).await.unwrap();
        assert!(first.is_some());

        let dup = repo.create("bob", "s3cret", Role::User).await.unwrap();
        assert!(dup.is_none());

        let found = repo.by_passcode("s3cret").await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
    }

    #[tokio::test]
    async fn ensure_admin_creates_and_syncs() {
        let store = Store::open_in_memory().await.unwrap();
        let repo = UsersRepo::new(store);

        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("admin_config.json");

        // No config file: default passcode.
        let admin = repo.ensure_admin(&config).await.unwrap();
        assert_eq!(admin.passcode, "admin");
        assert!(admin.is_admin());

        // Config appears: passcode syncs on the next startup.
        std::fs::write(&config, r#"{"admin_passcode": "hunter2"}"#).unwrap();
        let admin = repo.ensure_admin(&config).await.unwrap();
        assert_eq!(admin.passcode, "hunter2");

        let found = repo.by_passcode("hunter2").await.unwrap();
        assert!(found.is_some());
    }
}
