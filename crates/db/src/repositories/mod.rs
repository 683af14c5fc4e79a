use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use leadsync_core::domain::crm::{
    CrmContact, CrmRole, CrmTask, CrmToken, CrmUser, Pipeline, Stage,
};
use leadsync_core::domain::lead::{CrmLeadRecord, Lead, LeadStatus};
use leadsync_core::domain::sync::SyncLog;

pub mod lead;
pub mod mirror;
pub mod pipeline;
pub mod sync_log;
pub mod token;

pub use lead::SqlLeadRepository;
pub use mirror::SqlMirrorRepository;
pub use pipeline::SqlPipelineRepository;
pub use sync_log::SqlSyncLogRepository;
pub use token::SqlTokenRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Result of a keyed upsert: whether the external identifier was seen for
/// the first time or an existing row was refreshed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn find_by_account(&self, account_id: &str)
        -> Result<Option<CrmToken>, RepositoryError>;
    /// Insert-or-update keyed by `account_id`.
    async fn save(&self, token: &CrmToken) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait PipelineRepository: Send + Sync {
    async fn upsert_pipeline(&self, pipeline: &Pipeline)
        -> Result<UpsertOutcome, RepositoryError>;
    /// Upserts CRM-sourced stage columns; never writes `mapped_status`.
    async fn upsert_stage(&self, stage: &Stage) -> Result<UpsertOutcome, RepositoryError>;
    /// Operator-facing write of the locally owned stage mapping.
    async fn set_stage_mapping(
        &self,
        stage_id: i64,
        status: Option<LeadStatus>,
    ) -> Result<(), RepositoryError>;
    async fn find_pipeline(&self, id: i64) -> Result<Option<Pipeline>, RepositoryError>;
    async fn find_stage(&self, id: i64) -> Result<Option<Stage>, RepositoryError>;
    async fn list_stages(&self, pipeline_id: i64) -> Result<Vec<Stage>, RepositoryError>;
    /// Stage id -> operator-configured status, for the lead mapper.
    async fn stage_mappings(&self) -> Result<Vec<(i64, LeadStatus)>, RepositoryError>;
}

#[async_trait]
pub trait MirrorRepository: Send + Sync {
    async fn upsert_user(&self, user: &CrmUser) -> Result<UpsertOutcome, RepositoryError>;
    async fn upsert_role(&self, role: &CrmRole) -> Result<UpsertOutcome, RepositoryError>;
    async fn upsert_contact(&self, contact: &CrmContact)
        -> Result<UpsertOutcome, RepositoryError>;
    async fn upsert_task(&self, task: &CrmTask) -> Result<UpsertOutcome, RepositoryError>;
}

#[async_trait]
pub trait LeadRepository: Send + Sync {
    /// Reconcile one CRM lead. Insert keyed by `amo_lead_id`; on conflict
    /// update CRM-sourced columns, leaving `status` untouched once a human
    /// has locked it.
    async fn upsert_from_crm(
        &self,
        record: &CrmLeadRecord,
    ) -> Result<UpsertOutcome, RepositoryError>;
    async fn find_by_amo_id(&self, amo_lead_id: i64) -> Result<Option<Lead>, RepositoryError>;
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Lead>, RepositoryError>;
    /// Human status change; locks `status` against future CRM overwrites.
    async fn set_status(&self, id: &Uuid, status: LeadStatus) -> Result<(), RepositoryError>;
    async fn insert_local(&self, lead: &Lead) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    /// Append-only; a log row is never updated after insert.
    async fn insert(&self, log: &SyncLog) -> Result<(), RepositoryError>;
    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncLog>, RepositoryError>;
    async fn last(&self) -> Result<Option<SyncLog>, RepositoryError>;
}
