use chrono::Utc;

use leadsync_core::domain::crm::{CrmContact, CrmRole, CrmTask, CrmUser};

use super::{MirrorRepository, RepositoryError, UpsertOutcome};
use crate::DbPool;

/// Keyed upserts for the directory mirror tables (`amo_users`, `amo_roles`,
/// `amo_contacts`, `amo_tasks`). All share the same shape: the CRM id is
/// the primary key, every CRM-sourced column is refreshed on conflict.
pub struct SqlMirrorRepository {
    pool: DbPool,
}

impl SqlMirrorRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, query: &'static str, id: i64) -> Result<bool, RepositoryError> {
        Ok(sqlx::query(query).bind(id).fetch_optional(&self.pool).await?.is_some())
    }
}

#[async_trait::async_trait]
impl MirrorRepository for SqlMirrorRepository {
    async fn upsert_user(&self, user: &CrmUser) -> Result<UpsertOutcome, RepositoryError> {
        let existed = self.exists("SELECT 1 FROM amo_users WHERE id = ?", user.id).await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO amo_users (id, name, email, lang, account_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 lang = excluded.lang,
                 account_id = excluded.account_id,
                 updated_at = excluded.updated_at",
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.lang)
        .bind(&user.account_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(if existed { UpsertOutcome::Updated } else { UpsertOutcome::Created })
    }

    async fn upsert_role(&self, role: &CrmRole) -> Result<UpsertOutcome, RepositoryError> {
        let existed = self.exists("SELECT 1 FROM amo_roles WHERE id = ?", role.id).await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO amo_roles (id, name, account_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 account_id = excluded.account_id,
                 updated_at = excluded.updated_at",
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.account_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(if existed { UpsertOutcome::Updated } else { UpsertOutcome::Created })
    }

    async fn upsert_contact(
        &self,
        contact: &CrmContact,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let existed = self.exists("SELECT 1 FROM amo_contacts WHERE id = ?", contact.id).await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO amo_contacts (id, name, first_name, last_name, responsible_user_id,
                                       account_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 first_name = excluded.first_name,
                 last_name = excluded.last_name,
                 responsible_user_id = excluded.responsible_user_id,
                 account_id = excluded.account_id,
                 updated_at = excluded.updated_at",
        )
        .bind(contact.id)
        .bind(&contact.name)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(contact.responsible_user_id)
        .bind(&contact.account_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(if existed { UpsertOutcome::Updated } else { UpsertOutcome::Created })
    }

    async fn upsert_task(&self, task: &CrmTask) -> Result<UpsertOutcome, RepositoryError> {
        let existed = self.exists("SELECT 1 FROM amo_tasks WHERE id = ?", task.id).await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO amo_tasks (id, text, task_type_id, complete_till, is_completed,
                                    responsible_user_id, entity_id, entity_type, account_id,
                                    created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 text = excluded.text,
                 task_type_id = excluded.task_type_id,
                 complete_till = excluded.complete_till,
                 is_completed = excluded.is_completed,
                 responsible_user_id = excluded.responsible_user_id,
                 entity_id = excluded.entity_id,
                 entity_type = excluded.entity_type,
                 account_id = excluded.account_id,
                 updated_at = excluded.updated_at",
        )
        .bind(task.id)
        .bind(&task.text)
        .bind(task.task_type_id)
        .bind(task.complete_till)
        .bind(task.is_completed)
        .bind(task.responsible_user_id)
        .bind(task.entity_id)
        .bind(&task.entity_type)
        .bind(&task.account_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(if existed { UpsertOutcome::Updated } else { UpsertOutcome::Created })
    }
}
