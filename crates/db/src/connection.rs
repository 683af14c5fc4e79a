use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use leadsync_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Opens the configured SQLite pool. Every connection is prepared with
/// foreign keys, WAL and a busy timeout before it is handed out, so the
/// schema's referential checks hold on every pool member.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}

/// Single-connection in-memory database for tests. A second connection
/// to `sqlite::memory:` would see a different database, so the pool is
/// capped at one.
pub fn memory_config() -> DatabaseConfig {
    DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        timeout_secs: 30,
    }
}
