use leadsync_core::config::{AppConfig, LoadOptions};
use leadsync_db::connect;
use leadsync_db::repositories::{SqlSyncLogRepository, SyncLogRepository};

pub fn run(limit: u32) -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return format!("failed to initialize async runtime: {error}"),
    };

    let logs = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| format!("database unavailable: {error}"))?;
        SqlSyncLogRepository::new(pool)
            .list_recent(limit)
            .await
            .map_err(|error| format!("failed to read sync history: {error}"))
    });

    let logs = match logs {
        Ok(logs) => logs,
        Err(message) => return message,
    };

    if logs.is_empty() {
        return "no sync runs recorded yet".to_string();
    }

    let mut lines = vec![format!("recent sync runs (newest first, limit {limit}):")];
    for log in logs {
        let mut line = format!(
            "- {} {} {} created={} updated={} failed={} total={} duration={}ms",
            log.created_at.to_rfc3339(),
            log.sync_type.as_str(),
            log.status.as_str(),
            log.created_count,
            log.updated_count,
            log.failed_count,
            log.total_processed,
            log.duration_ms,
        );
        if let Some(error_message) = log.error_message {
            line.push_str(&format!(" error={error_message:?}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}
