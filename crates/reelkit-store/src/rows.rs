//! Row decoding helpers shared by the repositories.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::error::{StoreError, StoreResult};

pub(crate) fn get_datetime(row: &SqliteRow, column: &str) -> StoreResult<DateTime<Utc>> {
    let raw: String = row.try_get(column)?;
    parse_datetime(column, &raw)
}

pub(crate) fn get_opt_datetime(row: &SqliteRow, column: &str) -> StoreResult<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| parse_datetime(column, &s)).transpose()
}

fn parse_datetime(column: &str, raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::corrupt(column, format!("bad timestamp {raw:?}: {e}")))
}

/// Decode a nullable JSON TEXT column, treating NULL as an empty object.
pub(crate) fn get_json_object(row: &SqliteRow, column: &str) -> StoreResult<serde_json::Value> {
    let raw: Option<String> = row.try_get(column)?;
    match raw {
        Some(s) if !s.is_empty() => Ok(serde_json::from_str(&s)?),
        _ => Ok(serde_json::Value::Object(Default::default())),
    }
}

pub(crate) fn get_bool(row: &SqliteRow, column: &str) -> StoreResult<bool> {
    let v: i64 = row.try_get(column)?;
    Ok(v != 0)
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
