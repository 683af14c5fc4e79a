use std::time::Duration;

use tracing::{error, info, warn};

use leadsync_amocrm::{AmoClient, SyncEngine};
use leadsync_core::domain::sync::SyncType;
use leadsync_core::SyncError;
use leadsync_db::{connect, migrations};

use crate::commands::{build_runtime, init_logging, load_config, CommandResult};

/// Fixed-interval sync loop. Each tick is a normal `SCHEDULED` run; a tick
/// that fires while the previous run is still active is rejected by the
/// engine's run lock and skipped, never queued.
pub fn run() -> CommandResult {
    let config = match load_config("schedule") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    init_logging(&config);
    let runtime = match build_runtime("schedule") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let client = AmoClient::new(&config.amo, &config.sync)
            .map_err(|error| ("http_client", error.to_string(), 6u8))?;
        let engine = SyncEngine::new(pool, client, &config.amo, &config.sync);

        let mut interval =
            tokio::time::interval(Duration::from_secs(config.sync.schedule_interval_secs));
        info!(interval_secs = config.sync.schedule_interval_secs, "scheduler started");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("scheduler interrupted, shutting down");
                    break;
                }
                _ = interval.tick() => {
                    match engine.run(SyncType::Scheduled).await {
                        Ok(report) => info!(
                            status = report.status.as_str(),
                            created = report.created_count,
                            updated = report.updated_count,
                            failed = report.failed_count,
                            "scheduled run finished"
                        ),
                        Err(SyncError::AlreadyRunning { account_id }) => {
                            warn!(%account_id, "previous run still active, tick skipped");
                        }
                        Err(error) => error!(%error, "scheduled run aborted"),
                    }
                }
            }
        }
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success("schedule", "scheduler stopped"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("schedule", error_class, message, exit_code)
        }
    }
}
