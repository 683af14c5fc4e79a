use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use leadsync_core::domain::lead::{ContactMethod, ContactTime, CrmLeadRecord, Lead, LeadStatus};

use super::{LeadRepository, RepositoryError, UpsertOutcome};
use crate::DbPool;

pub struct SqlLeadRepository {
    pool: DbPool,
}

impl SqlLeadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_lead(row: &sqlx::sqlite::SqliteRow) -> Result<Lead, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let contact_method_str: String =
        row.try_get("contact_method").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let contact_time_str: String =
        row.try_get("contact_time").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let property_id: Option<String> =
        row.try_get("property_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let client_id: Option<String> =
        row.try_get("client_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let parse_uuid = |raw: &str| {
        Uuid::parse_str(raw).map_err(|e| RepositoryError::Decode(format!("bad uuid `{raw}`: {e}")))
    };
    let parse_ts = |raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| RepositoryError::Decode(format!("bad timestamp `{raw}`: {e}")))
    };

    Ok(Lead {
        id: parse_uuid(&id)?,
        amo_lead_id: row
            .try_get("amo_lead_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        guest_name: row
            .try_get("guest_name")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        guest_phone: row
            .try_get("guest_phone")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        guest_email: row
            .try_get("guest_email")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        status: LeadStatus::parse(&status_str)
            .ok_or_else(|| RepositoryError::Decode(format!("bad status `{status_str}`")))?,
        status_locked: row
            .try_get("status_locked")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        responsible_user_id: row
            .try_get("responsible_user_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        property_id: property_id.as_deref().map(parse_uuid).transpose()?,
        client_id: client_id.as_deref().map(parse_uuid).transpose()?,
        amo_contact_id: row
            .try_get("amo_contact_id")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?,
        comment: row.try_get("comment").map_err(|e| RepositoryError::Decode(e.to_string()))?,
        contact_method: ContactMethod::parse(&contact_method_str).ok_or_else(|| {
            RepositoryError::Decode(format!("bad contact_method `{contact_method_str}`"))
        })?,
        contact_time: ContactTime::parse(&contact_time_str).ok_or_else(|| {
            RepositoryError::Decode(format!("bad contact_time `{contact_time_str}`"))
        })?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    })
}

const LEAD_COLUMNS: &str = "id, amo_lead_id, guest_name, guest_phone, guest_email, status,
                            status_locked, responsible_user_id, property_id, client_id,
                            amo_contact_id, comment, contact_method, contact_time,
                            created_at, updated_at";

#[async_trait::async_trait]
impl LeadRepository for SqlLeadRepository {
    async fn upsert_from_crm(
        &self,
        record: &CrmLeadRecord,
    ) -> Result<UpsertOutcome, RepositoryError> {
        let existed = sqlx::query("SELECT 1 FROM leads WHERE amo_lead_id = ?")
            .bind(record.amo_lead_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        let now = Utc::now().to_rfc3339();

        // Single atomic statement. The status assignment is guarded in SQL:
        // once a human has locked the status, the CRM value is discarded.
        sqlx::query(
            "INSERT INTO leads (id, amo_lead_id, guest_name, status, status_locked,
                                responsible_user_id, amo_contact_id, contact_method,
                                contact_time, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?, 'CALL', 'ANYTIME', ?, ?)
             ON CONFLICT(amo_lead_id) DO UPDATE SET
                 guest_name = excluded.guest_name,
                 status = CASE WHEN leads.status_locked = 0
                               THEN excluded.status
                               ELSE leads.status END,
                 responsible_user_id = excluded.responsible_user_id,
                 amo_contact_id = excluded.amo_contact_id,
                 updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(record.amo_lead_id)
        .bind(&record.guest_name)
        .bind(record.status.as_str())
        .bind(record.responsible_user_id)
        .bind(record.amo_contact_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(if existed { UpsertOutcome::Updated } else { UpsertOutcome::Created })
    }

    async fn find_by_amo_id(&self, amo_lead_id: i64) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE amo_lead_id = ?"
        ))
        .bind(amo_lead_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_lead(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Lead>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_lead(r)?)),
            None => Ok(None),
        }
    }

    async fn set_status(&self, id: &Uuid, status: LeadStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE leads SET status = ?, status_locked = 1, updated_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Decode(format!("unknown lead id {id}")));
        }

        Ok(())
    }

    async fn insert_local(&self, lead: &Lead) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO leads (id, amo_lead_id, guest_name, guest_phone, guest_email, status,
                                status_locked, responsible_user_id, property_id, client_id,
                                amo_contact_id, comment, contact_method, contact_time,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(lead.id.to_string())
        .bind(lead.amo_lead_id)
        .bind(&lead.guest_name)
        .bind(&lead.guest_phone)
        .bind(&lead.guest_email)
        .bind(lead.status.as_str())
        .bind(lead.status_locked)
        .bind(lead.responsible_user_id)
        .bind(lead.property_id.map(|id| id.to_string()))
        .bind(lead.client_id.map(|id| id.to_string()))
        .bind(lead.amo_contact_id)
        .bind(&lead.comment)
        .bind(lead.contact_method.as_str())
        .bind(lead.contact_time.as_str())
        .bind(lead.created_at.to_rfc3339())
        .bind(lead.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use leadsync_core::domain::lead::{
        ContactMethod, ContactTime, CrmLeadRecord, Lead, LeadStatus,
    };

    use super::SqlLeadRepository;
    use crate::repositories::{LeadRepository, UpsertOutcome};
    use crate::{connect, memory_config, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect(&memory_config()).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn crm_record(amo_lead_id: i64) -> CrmLeadRecord {
        CrmLeadRecord {
            amo_lead_id,
            guest_name: Some("Maria".to_string()),
            status: LeadStatus::New,
            responsible_user_id: None,
            amo_contact_id: None,
        }
    }

    fn local_lead() -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::new_v4(),
            amo_lead_id: None,
            guest_name: Some("Walk-in".to_string()),
            guest_phone: Some("+971500000000".to_string()),
            guest_email: None,
            status: LeadStatus::New,
            status_locked: false,
            responsible_user_id: None,
            property_id: None,
            client_id: None,
            amo_contact_id: None,
            comment: Some("asked about penthouses".to_string()),
            contact_method: ContactMethod::Whatsapp,
            contact_time: ContactTime::Evening,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn crm_lead_is_created_once_and_updated_after() {
        let repo = SqlLeadRepository::new(setup().await);

        assert_eq!(
            repo.upsert_from_crm(&crm_record(7001)).await.expect("first"),
            UpsertOutcome::Created
        );

        let mut renamed = crm_record(7001);
        renamed.guest_name = Some("Maria K.".to_string());
        assert_eq!(
            repo.upsert_from_crm(&renamed).await.expect("second"),
            UpsertOutcome::Updated
        );

        let found = repo.find_by_amo_id(7001).await.expect("find").expect("exists");
        assert_eq!(found.guest_name.as_deref(), Some("Maria K."));
        assert!(found.originates_from_crm());
    }

    #[tokio::test]
    async fn resync_does_not_duplicate_an_existing_crm_lead() {
        let pool = setup().await;
        let repo = SqlLeadRepository::new(pool.clone());

        repo.upsert_from_crm(&crm_record(7001)).await.expect("first");
        repo.upsert_from_crm(&crm_record(7001)).await.expect("second");

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM leads WHERE amo_lead_id = 7001")
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn human_status_edit_survives_resync() {
        let repo = SqlLeadRepository::new(setup().await);

        repo.upsert_from_crm(&crm_record(7001)).await.expect("create");
        let lead = repo.find_by_amo_id(7001).await.expect("find").expect("exists");
        repo.set_status(&lead.id, LeadStatus::Closed).await.expect("human edit");

        // Upstream now reports IN_PROGRESS; the local edit must win.
        let mut upstream = crm_record(7001);
        upstream.status = LeadStatus::InProgress;
        repo.upsert_from_crm(&upstream).await.expect("resync");

        let found = repo.find_by_amo_id(7001).await.expect("find").expect("exists");
        assert_eq!(found.status, LeadStatus::Closed);
        assert!(found.status_locked);
    }

    #[tokio::test]
    async fn unlocked_status_follows_the_crm() {
        let repo = SqlLeadRepository::new(setup().await);

        repo.upsert_from_crm(&crm_record(7001)).await.expect("create");

        let mut upstream = crm_record(7001);
        upstream.status = LeadStatus::InProgress;
        repo.upsert_from_crm(&upstream).await.expect("resync");

        let found = repo.find_by_amo_id(7001).await.expect("find").expect("exists");
        assert_eq!(found.status, LeadStatus::InProgress);
        assert!(!found.status_locked);
    }

    #[tokio::test]
    async fn local_leads_are_untouched_by_crm_upserts() {
        let repo = SqlLeadRepository::new(setup().await);

        let lead = local_lead();
        repo.insert_local(&lead).await.expect("insert local");
        repo.upsert_from_crm(&crm_record(7001)).await.expect("crm upsert");

        let found = repo.find_by_id(&lead.id).await.expect("find").expect("exists");
        assert_eq!(found.amo_lead_id, None);
        assert_eq!(found.guest_name.as_deref(), Some("Walk-in"));
        assert_eq!(found.contact_method, ContactMethod::Whatsapp);
    }

    #[tokio::test]
    async fn absent_crm_fields_stay_null_not_empty() {
        let repo = SqlLeadRepository::new(setup().await);

        let mut record = crm_record(7001);
        record.guest_name = None;
        repo.upsert_from_crm(&record).await.expect("create");

        let found = repo.find_by_amo_id(7001).await.expect("find").expect("exists");
        assert_eq!(found.guest_name, None);
    }
}
