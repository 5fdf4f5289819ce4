use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub mod fixtures;
pub mod models;

mod audit;
mod camps;
mod distributions;
mod donations;
mod reminders;
mod users;

pub use audit::*;
pub use camps::*;
pub use distributions::*;
pub use donations::*;
pub use reminders::*;
pub use users::*;

pub type DbPool = Pool<SqliteConnectionManager>;

pub const MEMORY_URL: &str = ":memory:";

const SCHEMA: &str = include_str!("../../migrations/init.sql");

pub async fn init_pool(database_url: &str) -> anyhow::Result<DbPool> {
    let pool = if database_url == MEMORY_URL {
        // Each in-memory connection is a separate database: pin exactly one
        // connection and never recycle it.
        Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None)
            .connection_timeout(Duration::from_secs(30))
            .build(SqliteConnectionManager::memory().with_init(configure_connection))
    } else {
        Pool::builder()
            .max_size(10)
            .connection_timeout(Duration::from_secs(30))
            .build(SqliteConnectionManager::file(database_url).with_init(configure_connection))
    }
    .map_err(|e| anyhow::anyhow!("Failed to create DB pool: {}", e))?;

    migrate(&pool)?;
    Ok(pool)
}

fn configure_connection(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_secs(5))
}

/// Applies the bundled schema. Every statement is `IF NOT EXISTS`, so this is
/// safe to run on each start-up.
pub fn migrate(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub(crate) fn json_text<T: Serialize>(value: &T) -> rusqlite::Result<String> {
    serde_json::to_string(value).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, column: &str) -> rusqlite::Result<T> {
    let idx = row.as_ref().column_index(column)?;
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("foodloop.db");
        let url = path.to_str().unwrap();

        let pool = init_pool(url).await.unwrap();
        assert!(fixtures::seed(&pool).await.unwrap());
        drop(pool);

        // Reopening re-runs the schema and must keep existing rows.
        let pool = init_pool(url).await.unwrap();
        assert_eq!(count_users(&pool).await.unwrap(), fixtures::users().len() as i64);
        assert!(!fixtures::seed(&pool).await.unwrap());
        assert_eq!(list_audit_logs(&pool, None).await.unwrap().len(), fixtures::audit_logs().len());
    }
}
