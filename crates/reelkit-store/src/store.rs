//! SQLite store with single-writer discipline.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::schema::{SCHEMA_SQL, SCHEMA_VERSION};

/// Max attempts for a write hitting lock contention.
const WRITE_RETRY_ATTEMPTS: u32 = 5;
/// Base backoff between write retries; grows linearly with the attempt.
const WRITE_RETRY_BASE: Duration = Duration::from_millis(100);

/// A dynamically typed SQL parameter.
///
/// The store exposes string-SQL primitives (`query`, `query_one`, `write`);
/// repositories bind parameters through this enum so a failed write can be
/// re-issued verbatim on lock contention.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => SqlValue::Null,
        }
    }
}

/// Embedded SQLite store.
///
/// Reads run concurrently against the pool; writes are serialized through a
/// process-wide mutex and retried with bounded backoff on lock contention.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Open (creating if missing) the store at `path` and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.apply_schema().await?;
        info!("store opened at {} (schema v{})", path.display(), SCHEMA_VERSION);
        Ok(store)
    }

    /// Open an in-memory store. Used by tests.
    pub async fn open_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(sqlx::Error::from)?
            .foreign_keys(true);

        // A memory database exists per connection; pin the pool to one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        };
        store.apply_schema().await?;
        Ok(store)
    }

    async fn apply_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        self.write(
            "INSERT OR REPLACE INTO metadata (key, value, updated_at) \
             VALUES ('schema_version', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ','now'))",
            &[SqlValue::Text(SCHEMA_VERSION.to_string())],
        )
        .await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn bind<'q>(
        sql: &'q str,
        params: &'q [SqlValue],
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        let mut q = sqlx::query(sql);
        for p in params {
            q = match p {
                SqlValue::Null => q.bind(None::<String>),
                SqlValue::Integer(v) => q.bind(*v),
                SqlValue::Real(v) => q.bind(*v),
                SqlValue::Text(v) => q.bind(v.as_str()),
            };
        }
        q
    }

    /// Run a SELECT and return all rows.
    pub async fn query(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Vec<SqliteRow>> {
        Ok(Self::bind(sql, params).fetch_all(&self.pool).await?)
    }

    /// Run a SELECT and return the first row, if any.
    pub async fn query_one(&self, sql: &str, params: &[SqlValue]) -> StoreResult<Option<SqliteRow>> {
        Ok(Self::bind(sql, params).fetch_optional(&self.pool).await?)
    }

    /// Run an INSERT/UPDATE/DELETE under the write lock, retrying on lock
    /// contention. Returns the number of affected rows.
    pub async fn write(&self, sql: &str, params: &[SqlValue]) -> StoreResult<u64> {
        let _guard = self.write_lock.lock().await;
        self.write_locked(sql, params).await
    }

    /// Acquire the write lock for a multi-statement sequence.
    ///
    /// Use [`Store::write_locked`] for the statements inside; dropping the
    /// guard releases the writer slot.
    pub async fn lock_writes(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    /// Run a write while already holding the lock from [`Store::lock_writes`].
    pub async fn write_locked(&self, sql: &str, params: &[SqlValue]) -> StoreResult<u64> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match Self::bind(sql, params).execute(&self.pool).await {
                Ok(done) => return Ok(done.rows_affected()),
                Err(e) if StoreError::is_lock_contention(&e) && attempt < WRITE_RETRY_ATTEMPTS => {
                    let delay = WRITE_RETRY_BASE * attempt;
                    debug!(attempt, ?delay, "database locked, retrying write");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Reclaim space and defragment.
    pub async fn vacuum(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        info!("running VACUUM");
        sqlx::raw_sql("VACUUM").execute(&self.pool).await?;
        Ok(())
    }

    /// Refresh query-planner statistics.
    pub async fn analyze(&self) -> StoreResult<()> {
        if let Err(e) = sqlx::raw_sql("ANALYZE").execute(&self.pool).await {
            warn!("ANALYZE failed: {e}");
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn schema_applies_idempotently() {
        let store = Store::open_in_memory().await.unwrap();
        // Re-applying must not fail.
        store.apply_schema().await.unwrap();

        let row = store
            .query_one(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                &[],
            )
            .await
            .unwrap()
            .unwrap();
        let version: String = row.try_get("value").unwrap();
        assert_eq!(version, SCHEMA_VERSION.to_string());
    }

    #[tokio::test]
    async fn write_reports_affected_rows() {
        let store = Store::open_in_memory().await.unwrap();
        let affected = store
            .write(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
                &["k".into(), "\"v\"".into(), "2026-01-01T00:00:00Z".into()],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let affected = store
            .write("DELETE FROM settings WHERE key = ?1", &["missing".into()])
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }
}
