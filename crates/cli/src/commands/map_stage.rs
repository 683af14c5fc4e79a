use leadsync_core::domain::lead::LeadStatus;
use leadsync_db::connect;
use leadsync_db::repositories::{PipelineRepository, SqlPipelineRepository};

use crate::commands::{build_runtime, load_config, CommandResult};

/// Set or clear the operator-owned status mapping of a pipeline stage.
pub fn run(stage_id: i64, status_raw: &str) -> CommandResult {
    let mapping = if status_raw.trim().eq_ignore_ascii_case("none") {
        None
    } else {
        match LeadStatus::parse(status_raw) {
            Some(status) => Some(status),
            None => {
                return CommandResult::failure(
                    "map-stage",
                    "invalid_status",
                    format!(
                        "`{status_raw}` is not a lead status; expected NEW, IN_PROGRESS, CLOSED, or NONE"
                    ),
                    2,
                );
            }
        }
    };

    let config = match load_config("map-stage") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match build_runtime("map-stage") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        SqlPipelineRepository::new(pool.clone())
            .set_stage_mapping(stage_id, mapping)
            .await
            .map_err(|error| ("stage_mapping", error.to_string(), 5u8))?;
        pool.close().await;
        Ok::<(), (&'static str, String, u8)>(())
    });

    match result {
        Ok(()) => CommandResult::success(
            "map-stage",
            match mapping {
                Some(status) => {
                    format!("stage {stage_id} now maps to {}", status.as_str())
                }
                None => format!("stage {stage_id} mapping cleared"),
            },
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("map-stage", error_class, message, exit_code)
        }
    }
}
