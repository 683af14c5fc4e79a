use leadsync_amocrm::{AmoClient, SyncEngine};
use leadsync_core::domain::sync::SyncType;
use leadsync_core::SyncError;
use leadsync_db::{connect, migrations};

use crate::commands::{build_runtime, init_logging, load_config, CommandResult};

pub fn run(scheduled: bool) -> CommandResult {
    let config = match load_config("sync") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    init_logging(&config);
    let runtime = match build_runtime("sync") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let sync_type = if scheduled { SyncType::Scheduled } else { SyncType::Manual };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let client = AmoClient::new(&config.amo, &config.sync)
            .map_err(|error| ("http_client", error.to_string(), 6u8))?;
        let engine = SyncEngine::new(pool.clone(), client, &config.amo, &config.sync);
        let report = engine.run(sync_type).await.map_err(|error| {
            let error_class = match &error {
                SyncError::Auth(_) => "crm_auth",
                SyncError::AlreadyRunning { .. } => "run_in_progress",
                SyncError::Segment { .. } => "sync_segment",
                SyncError::Repository(_) => "persistence",
            };
            (error_class, error.to_string(), 6u8)
        })?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(report)
    });

    match result {
        Ok(report) => CommandResult::success(
            "sync",
            format!(
                "{} sync finished: {} (created {}, updated {}, failed {}, {} records in {} ms)",
                sync_type.as_str(),
                report.status.as_str(),
                report.created_count,
                report.updated_count,
                report.failed_count,
                report.total_processed,
                report.duration_ms,
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("sync", error_class, message, exit_code)
        }
    }
}
