//! Settings repository. Values are stored JSON-encoded.

use std::collections::BTreeMap;

use sqlx::Row;

use crate::error::StoreResult;
use crate::rows::now_rfc3339;
use crate::store::Store;

/// Typed access to the `settings` table.
#[derive(Clone)]
pub struct SettingsRepo {
    store: Store,
}

impl SettingsRepo {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<serde_json::Value>> {
        let row = self
            .store
            .query_one("SELECT value FROM settings WHERE key = ?1", &[key.into()])
            .await?;
        match row {
            Some(row) => {
                let raw: String = row.try_get("value")?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    /// Get a setting, falling back to `default` when absent.
    pub async fn get_or(
        &self,
        key: &str,
        default: serde_json::Value,
    ) -> StoreResult<serde_json::Value> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    pub async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        description: Option<&str>,
    ) -> StoreResult<()> {
        self.store
            .write(
                "INSERT OR REPLACE INTO settings (key, value, description, updated_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                &[
                    key.into(),
                    serde_json::to_string(value)?.into(),
                    description.into(),
                    now_rfc3339().into(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        let affected = self
            .store
            .write("DELETE FROM settings WHERE key = ?1", &[key.into()])
            .await?;
        Ok(affected > 0)
    }

    pub async fn all(&self) -> StoreResult<BTreeMap<String, serde_json::Value>> {
        let rows = self
            .store
            .query("SELECT key, value FROM settings ORDER BY key", &[])
            .await?;
        let mut settings = BTreeMap::new();
        for row in rows {
            let key: String = row.try_get("key")?;
            let raw: String = row.try_get("value")?;
            settings.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn values_round_trip_as_json() {
        let repo = SettingsRepo::new(Store::open_in_memory().await.unwrap());

        assert!(repo.get("proxy").await.unwrap().is_none());
        assert_eq!(
            repo.get_or("proxy", json!(null)).await.unwrap(),
            json!(null)
        );

        repo.set("proxy", &json!("socks5://127.0.0.1:9050"), Some("global proxy"))
            .await
            .unwrap();
        repo.set("workers", &json!({"count": 4}), None)
            .await
            .unwrap();

        assert_eq!(
            repo.get("proxy").await.unwrap().unwrap(),
            json!("socks5://127.0.0.1:9050")
        );
        assert_eq!(repo.all().await.unwrap().len(), 2);

        assert!(repo.delete("proxy").await.unwrap());
        assert!(!repo.delete("proxy").await.unwrap());
    }
}
