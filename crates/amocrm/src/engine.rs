//! One-shot reconciliation run: token, pipelines, directory mirrors,
//! leads, tasks, then exactly one `sync_logs` row.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use leadsync_core::config::{AmoConfig, SyncConfig};
use leadsync_core::domain::lead::LeadStatus;
use leadsync_core::domain::sync::{derive_status, SyncLog, SyncStatus, SyncType};
use leadsync_core::SyncError;
use leadsync_db::repositories::{
    LeadRepository, MirrorRepository, PipelineRepository, SqlLeadRepository, SqlMirrorRepository,
    SqlPipelineRepository, SqlSyncLogRepository, SqlTokenRepository, SyncLogRepository,
    UpsertOutcome,
};
use leadsync_db::DbPool;

use crate::client::AmoClient;
use crate::fetch::Paginator;
use crate::mapper;
use crate::token::TokenProvider;

/// Outcome of one segment of a run. Serialized into the log row's
/// metadata so operators can see where a partial run went wrong.
#[derive(Clone, Debug, Serialize)]
pub struct SegmentReport {
    pub segment: &'static str,
    pub created: i64,
    pub updated: i64,
    pub failed: i64,
    pub error: Option<String>,
}

impl SegmentReport {
    fn new(segment: &'static str) -> Self {
        Self { segment, created: 0, updated: 0, failed: 0, error: None }
    }

    fn count(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }

    /// Segment-level failure: keep whatever progress was made, record the
    /// error, and let the run move on to the next segment.
    fn abort(mut self, error: SyncError) -> Self {
        warn!(segment = self.segment, error = %error, "segment aborted");
        self.error = Some(error.to_string());
        self
    }

    fn finish(self) -> Self {
        info!(
            segment = self.segment,
            created = self.created,
            updated = self.updated,
            failed = self.failed,
            "segment finished"
        );
        self
    }
}

#[derive(Clone, Debug)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub created_count: i64,
    pub updated_count: i64,
    pub failed_count: i64,
    pub total_processed: i64,
    pub duration_ms: i64,
    pub segments: Vec<SegmentReport>,
}

pub struct SyncEngine {
    pool: DbPool,
    client: AmoClient,
    tokens: TokenProvider<SqlTokenRepository>,
    account_id: String,
    page_size: u32,
    run_lock: Mutex<()>,
}

impl SyncEngine {
    pub fn new(pool: DbPool, client: AmoClient, amo: &AmoConfig, sync: &SyncConfig) -> Self {
        let tokens = TokenProvider::new(
            SqlTokenRepository::new(pool.clone()),
            client.clone(),
            amo.account_id.clone(),
            sync.token_safety_margin_secs,
        );
        Self {
            pool,
            client,
            tokens,
            account_id: amo.account_id.clone(),
            page_size: sync.page_size,
            run_lock: Mutex::new(()),
        }
    }

    /// Run one full reconciliation. An overlapping call for the same
    /// account is rejected immediately, never queued.
    pub async fn run(&self, sync_type: SyncType) -> Result<SyncReport, SyncError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            return Err(SyncError::AlreadyRunning { account_id: self.account_id.clone() });
        };

        let started = Instant::now();
        info!(account_id = %self.account_id, sync_type = sync_type.as_str(), "sync run started");

        let access_token = match self.tokens.get_valid_token().await {
            Ok(token) => token,
            Err(error) => {
                self.record_aborted_run(sync_type, &error, &started).await;
                return Err(error);
            }
        };

        let segments = vec![
            self.sync_pipelines(&access_token).await,
            self.sync_users(&access_token).await,
            self.sync_contacts(&access_token).await,
            self.sync_leads(&access_token).await,
            self.sync_tasks(&access_token).await,
        ];

        let created_count: i64 = segments.iter().map(|s| s.created).sum();
        let updated_count: i64 = segments.iter().map(|s| s.updated).sum();
        let failed_count: i64 = segments.iter().map(|s| s.failed).sum();
        let total_processed = created_count + updated_count + failed_count;
        let segment_errors: Vec<String> =
            segments.iter().filter_map(|s| s.error.clone()).collect();

        let status = derive_status(!segment_errors.is_empty(), failed_count, total_processed);
        let error_message = if segment_errors.is_empty() {
            None
        } else {
            Some(segment_errors.join("; "))
        };

        let duration_ms = started.elapsed().as_millis() as i64;
        let report = SyncReport {
            status,
            created_count,
            updated_count,
            failed_count,
            total_processed,
            duration_ms,
            segments,
        };

        let log = SyncLog {
            id: Uuid::new_v4(),
            sync_type,
            status,
            created_count,
            updated_count,
            archived_count: 0,
            failed_count,
            total_processed,
            duration_ms,
            error_message,
            metadata: serde_json::to_value(&report.segments)
                .ok()
                .map(|segments| serde_json::json!({ "segments": segments })),
            created_at: Utc::now(),
        };
        SqlSyncLogRepository::new(self.pool.clone())
            .insert(&log)
            .await
            .map_err(|e| SyncError::Repository(e.to_string()))?;

        info!(
            account_id = %self.account_id,
            status = status.as_str(),
            created = created_count,
            updated = updated_count,
            failed = failed_count,
            duration_ms,
            "sync run finished"
        );
        Ok(report)
    }

    /// The run died before producing any result. Record a `FAILED` row so
    /// the abort is visible in history; the original error is what the
    /// caller sees.
    async fn record_aborted_run(&self, sync_type: SyncType, error: &SyncError, started: &Instant) {
        let log = SyncLog {
            id: Uuid::new_v4(),
            sync_type,
            status: derive_status(true, 0, 0),
            created_count: 0,
            updated_count: 0,
            archived_count: 0,
            failed_count: 0,
            total_processed: 0,
            duration_ms: started.elapsed().as_millis() as i64,
            error_message: Some(error.to_string()),
            metadata: None,
            created_at: Utc::now(),
        };
        if let Err(log_error) = SqlSyncLogRepository::new(self.pool.clone()).insert(&log).await {
            warn!(error = %log_error, "failed to record aborted run");
        }
    }

    /// Pipelines and their stages. A pipeline row always lands before its
    /// stages so the stage foreign key can never dangle; a failed pipeline
    /// upsert skips that pipeline's stages entirely.
    async fn sync_pipelines(&self, token: &str) -> SegmentReport {
        let mut report = SegmentReport::new("pipelines");
        let repo = SqlPipelineRepository::new(self.pool.clone());

        let pipelines = match self.client.list_pipelines(token).await {
            Ok(pipelines) => pipelines,
            Err(error) => return report.abort(error),
        };

        for pipeline in &pipelines {
            match repo.upsert_pipeline(&mapper::map_pipeline(pipeline, &self.account_id)).await {
                Ok(outcome) => report.count(outcome),
                Err(error) => {
                    warn!(pipeline_id = pipeline.id, error = %error, "pipeline upsert failed");
                    report.failed += 1;
                    continue;
                }
            }

            let statuses =
                pipeline.embedded.as_ref().map(|e| e.statuses.as_slice()).unwrap_or_default();
            for status in statuses {
                match repo.upsert_stage(&mapper::map_stage(status, pipeline.id)).await {
                    Ok(outcome) => report.count(outcome),
                    Err(error) => {
                        warn!(stage_id = status.id, error = %error, "stage upsert failed");
                        report.failed += 1;
                    }
                }
            }
        }

        report.finish()
    }

    async fn sync_users(&self, token: &str) -> SegmentReport {
        let mut report = SegmentReport::new("users");
        let repo = SqlMirrorRepository::new(self.pool.clone());
        let mut paginator = Paginator::new(self.page_size);

        while let Some(page) = paginator.next_page() {
            let users = match self.client.list_users(token, page, self.page_size).await {
                Ok(users) => users,
                Err(error) => return report.abort(error),
            };

            for user in &users {
                let roles = user.embedded.as_ref().map(|e| e.roles.as_slice()).unwrap_or_default();
                for role in roles {
                    match repo.upsert_role(&mapper::map_role(role, &self.account_id)).await {
                        Ok(outcome) => report.count(outcome),
                        Err(error) => {
                            warn!(role_id = role.id, error = %error, "role upsert failed");
                            report.failed += 1;
                        }
                    }
                }
                match repo.upsert_user(&mapper::map_user(user, &self.account_id)).await {
                    Ok(outcome) => report.count(outcome),
                    Err(error) => {
                        warn!(user_id = user.id, error = %error, "user upsert failed");
                        report.failed += 1;
                    }
                }
            }

            paginator.advance(users.len());
        }

        report.finish()
    }

    async fn sync_contacts(&self, token: &str) -> SegmentReport {
        let mut report = SegmentReport::new("contacts");
        let repo = SqlMirrorRepository::new(self.pool.clone());
        let mut paginator = Paginator::new(self.page_size);

        while let Some(page) = paginator.next_page() {
            let contacts = match self.client.list_contacts(token, page, self.page_size).await {
                Ok(contacts) => contacts,
                Err(error) => return report.abort(error),
            };

            for contact in &contacts {
                match repo.upsert_contact(&mapper::map_contact(contact, &self.account_id)).await {
                    Ok(outcome) => report.count(outcome),
                    Err(error) => {
                        warn!(contact_id = contact.id, error = %error, "contact upsert failed");
                        report.failed += 1;
                    }
                }
            }

            paginator.advance(contacts.len());
        }

        report.finish()
    }

    /// Each page is mapped and reconciled before the next one is
    /// requested, so a run interrupted mid-walk still leaves every page
    /// it saw fully applied.
    async fn sync_leads(&self, token: &str) -> SegmentReport {
        let mut report = SegmentReport::new("leads");
        let lead_repo = SqlLeadRepository::new(self.pool.clone());

        let stage_mappings: HashMap<i64, LeadStatus> =
            match SqlPipelineRepository::new(self.pool.clone()).stage_mappings().await {
                Ok(mappings) => mappings.into_iter().collect(),
                Err(error) => return report.abort(SyncError::Repository(error.to_string())),
            };

        let mut paginator = Paginator::new(self.page_size);
        while let Some(page) = paginator.next_page() {
            let leads = match self.client.list_leads(token, page, self.page_size).await {
                Ok(leads) => leads,
                Err(error) => return report.abort(error),
            };

            for lead in &leads {
                let record = mapper::map_lead(lead, &stage_mappings);
                match lead_repo.upsert_from_crm(&record).await {
                    Ok(outcome) => report.count(outcome),
                    Err(error) => {
                        warn!(amo_lead_id = lead.id, error = %error, "lead upsert failed");
                        report.failed += 1;
                    }
                }
            }

            paginator.advance(leads.len());
        }

        report.finish()
    }

    async fn sync_tasks(&self, token: &str) -> SegmentReport {
        let mut report = SegmentReport::new("tasks");
        let repo = SqlMirrorRepository::new(self.pool.clone());
        let mut paginator = Paginator::new(self.page_size);

        while let Some(page) = paginator.next_page() {
            let tasks = match self.client.list_tasks(token, page, self.page_size).await {
                Ok(tasks) => tasks,
                Err(error) => return report.abort(error),
            };

            for task in &tasks {
                match repo.upsert_task(&mapper::map_task(task, &self.account_id)).await {
                    Ok(outcome) => report.count(outcome),
                    Err(error) => {
                        warn!(task_id = task.id, error = %error, "task upsert failed");
                        report.failed += 1;
                    }
                }
            }

            paginator.advance(tasks.len());
        }

        report.finish()
    }
}
