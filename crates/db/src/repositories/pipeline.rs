use chrono::Utc;
use sqlx::Row;

use leadsync_core::domain::crm::{Pipeline, Stage};
use leadsync_core::domain::lead::LeadStatus;

use super::{PipelineRepository, RepositoryError, UpsertOutcome};
use crate::DbPool;

pub struct SqlPipelineRepository {
    pool: DbPool,
}

impl SqlPipelineRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, table: &'static str, id: i64) -> Result<bool, RepositoryError> {
        let query = match table {
            "amo_pipelines" => "SELECT 1 FROM amo_pipelines WHERE id = ?",
            _ => "SELECT 1 FROM amo_stages WHERE id = ?",
        };
        Ok(sqlx::query(query).bind(id).fetch_optional(&self.pool).await?.is_some())
    }
}

fn row_to_pipeline(row: &sqlx::sqlite::SqliteRow) -> Result<Pipeline, RepositoryError> {
    Ok(Pipeline {
        id: row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        name: row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        sort: row.try_get("sort").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        is_main: row.try_get("is_main").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        is_unsorted_on: row
            .try_get("is_unsorted_on")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        account_id: row
            .try_get("account_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

fn row_to_stage(row: &sqlx::sqlite::SqliteRow) -> Result<Stage, RepositoryError> {
    let mapped_status: Option<String> =
        row.try_get("mapped_status").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Stage {
        id: row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        pipeline_id: row
            .try_get("pipeline_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        name: row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        sort: row.try_get("sort").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        is_editable: row
            .try_get("is_editable")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        color: row.try_get("color").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        mapped_status: mapped_status.as_deref().and_then(LeadStatus::parse),
    })
}

#[async_trait::async_trait]
impl PipelineRepository for SqlPipelineRepository {
    async fn upsert_pipeline(
        &self,
        pipeline: &Pipeline,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let existed = self.exists("amo_pipelines", pipeline.id).await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO amo_pipelines (id, name, sort, is_main, is_unsorted_on,
                                        account_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 sort = excluded.sort,
                 is_main = excluded.is_main,
                 is_unsorted_on = excluded.is_unsorted_on,
                 account_id = excluded.account_id,
                 updated_at = excluded.updated_at",
        )
        .bind(pipeline.id)
        .bind(&pipeline.name)
        .bind(pipeline.sort)
        .bind(pipeline.is_main)
        .bind(pipeline.is_unsorted_on)
        .bind(&pipeline.account_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(if existed { UpsertOutcome::Updated } else { UpsertOutcome::Created })
    }

    async fn upsert_stage(&self, stage: &Stage) -> Result<UpsertOutcome, RepositoryError> {
        let existed = self.exists("amo_stages", stage.id).await?;
        let now = Utc::now().to_rfc3339();

        // mapped_status is operator-owned: the conflict clause leaves it alone.
        sqlx::query(
            "INSERT INTO amo_stages (id, pipeline_id, name, sort, is_editable, color,
                                     created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 pipeline_id = excluded.pipeline_id,
                 name = excluded.name,
                 sort = excluded.sort,
                 is_editable = excluded.is_editable,
                 color = excluded.color,
                 updated_at = excluded.updated_at",
        )
        .bind(stage.id)
        .bind(stage.pipeline_id)
        .bind(&stage.name)
        .bind(stage.sort)
        .bind(stage.is_editable)
        .bind(&stage.color)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(if existed { UpsertOutcome::Updated } else { UpsertOutcome::Created })
    }

    async fn set_stage_mapping(
        &self,
        stage_id: i64,
        status: Option<LeadStatus>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE amo_stages SET mapped_status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status.map(|s| s.as_str()))
        .bind(Utc::now().to_rfc3339())
        .bind(stage_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Decode(format!("unknown stage id {stage_id}")));
        }

        Ok(())
    }

    async fn find_pipeline(&self, id: i64) -> Result<Option<Pipeline>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, sort, is_main, is_unsorted_on, account_id
             FROM amo_pipelines WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_pipeline(r)?)),
            None => Ok(None),
        }
    }

    async fn find_stage(&self, id: i64) -> Result<Option<Stage>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, pipeline_id, name, sort, is_editable, color, mapped_status
             FROM amo_stages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_stage(r)?)),
            None => Ok(None),
        }
    }

    async fn list_stages(&self, pipeline_id: i64) -> Result<Vec<Stage>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, pipeline_id, name, sort, is_editable, color, mapped_status
             FROM amo_stages WHERE pipeline_id = ? ORDER BY sort ASC",
        )
        .bind(pipeline_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_stage).collect::<Result<Vec<_>, _>>()
    }

    async fn stage_mappings(&self) -> Result<Vec<(i64, LeadStatus)>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, mapped_status FROM amo_stages WHERE mapped_status IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut mappings = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let raw: String = row
                .try_get("mapped_status")
                .map_err(|e| RepositoryError::Decode(e.to_string()))?;
            let status = LeadStatus::parse(&raw)
                .ok_or_else(|| RepositoryError::Decode(format!("bad mapped_status `{raw}`")))?;
            mappings.push((id, status));
        }

        Ok(mappings)
    }
}
