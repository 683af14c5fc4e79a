use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use leadsync_core::domain::crm::CrmToken;

use super::{RepositoryError, TokenRepository};
use crate::DbPool;

pub struct SqlTokenRepository {
    pool: DbPool,
}

impl SqlTokenRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_token(row: &sqlx::sqlite::SqliteRow) -> Result<CrmToken, RepositoryError> {
    Ok(CrmToken {
        account_id: row
            .try_get("account_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        access_token: row
            .try_get("access_token")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        refresh_token: row
            .try_get("refresh_token")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        base_domain: row
            .try_get("base_domain")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

#[async_trait::async_trait]
impl TokenRepository for SqlTokenRepository {
    async fn find_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<CrmToken>, RepositoryError> {
        let row = sqlx::query(
            "SELECT account_id, access_token, refresh_token, expires_at, base_domain
             FROM amo_tokens WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_token(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, token: &CrmToken) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO amo_tokens (id, account_id, access_token, refresh_token,
                                     expires_at, base_domain, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(account_id) DO UPDATE SET
                 access_token = excluded.access_token,
                 refresh_token = excluded.refresh_token,
                 expires_at = excluded.expires_at,
                 base_domain = excluded.base_domain,
                 updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&token.account_id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .bind(&token.base_domain)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
