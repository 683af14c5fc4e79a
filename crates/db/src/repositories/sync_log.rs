use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use leadsync_core::domain::sync::{SyncLog, SyncStatus, SyncType};

use super::{RepositoryError, SyncLogRepository};
use crate::DbPool;

pub struct SqlSyncLogRepository {
    pool: DbPool,
}

impl SqlSyncLogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> Result<SyncLog, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let type_str: String =
        row.try_get("type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let metadata_str: Option<String> =
        row.try_get("metadata").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(SyncLog {
        id: Uuid::parse_str(&id)
            .map_err(|e| RepositoryError::Decode(format!("bad uuid `{id}`: {e}")))?,
        sync_type: SyncType::parse(&type_str)
            .ok_or_else(|| RepositoryError::Decode(format!("bad sync type `{type_str}`")))?,
        status: SyncStatus::parse(&status_str)
            .ok_or_else(|| RepositoryError::Decode(format!("bad sync status `{status_str}`")))?,
        created_count: row
            .try_get("created_count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        updated_count: row
            .try_get("updated_count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        archived_count: row
            .try_get("archived_count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        failed_count: row
            .try_get("failed_count")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        total_processed: row
            .try_get("total_processed")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        duration_ms: row
            .try_get("duration_ms")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        error_message: row
            .try_get("error_message")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        metadata: metadata_str
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepositoryError::Decode(format!("bad metadata json: {e}")))?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{created_at_str}`: {e}")))?,
    })
}

#[async_trait::async_trait]
impl SyncLogRepository for SqlSyncLogRepository {
    async fn insert(&self, log: &SyncLog) -> Result<(), RepositoryError> {
        let metadata = log
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepositoryError::Decode(format!("metadata not serializable: {e}")))?;

        sqlx::query(
            "INSERT INTO sync_logs (id, type, status, created_count, updated_count,
                                    archived_count, failed_count, total_processed,
                                    duration_ms, error_message, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(log.id.to_string())
        .bind(log.sync_type.as_str())
        .bind(log.status.as_str())
        .bind(log.created_count)
        .bind(log.updated_count)
        .bind(log.archived_count)
        .bind(log.failed_count)
        .bind(log.total_processed)
        .bind(log.duration_ms)
        .bind(&log.error_message)
        .bind(metadata)
        .bind(log.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncLog>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, type, status, created_count, updated_count, archived_count,
                    failed_count, total_processed, duration_ms, error_message, metadata,
                    created_at
             FROM sync_logs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_log).collect()
    }

    async fn last(&self) -> Result<Option<SyncLog>, RepositoryError> {
        Ok(self.list_recent(1).await?.into_iter().next())
    }
}
