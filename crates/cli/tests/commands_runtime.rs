use std::env;
use std::sync::{Mutex, OnceLock};

use leadsync_cli::commands::{logs, map_stage, migrate};
use serde_json::Value;

const VALID_ENV: &[(&str, &str)] = &[
    ("LEADSYNC_DATABASE_URL", "sqlite::memory:"),
    ("LEADSYNC_AMO_ACCOUNT_ID", "31920194"),
    ("LEADSYNC_AMO_BASE_DOMAIN", "testco.amocrm.ru"),
    ("LEADSYNC_AMO_CLIENT_ID", "client-id"),
    ("LEADSYNC_AMO_CLIENT_SECRET", "client-secret"),
];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(VALID_ENV, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_credentials() {
    with_env(&[("LEADSYNC_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn map_stage_rejects_an_unknown_status_before_touching_config() {
    // No env at all: the status is validated first.
    with_env(&[], || {
        let result = map_stage::run(142, "ARCHIVED");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "map-stage");
        assert_eq!(payload["error_class"], "invalid_status");
    });
}

#[test]
fn map_stage_fails_for_a_stage_that_was_never_synced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("leadsync.db").display());
    let env_vars: Vec<(&str, &str)> = VALID_ENV
        .iter()
        .map(|(key, value)| if *key == "LEADSYNC_DATABASE_URL" { (*key, db_url.as_str()) } else { (*key, *value) })
        .collect();

    with_env(&env_vars, || {
        assert_eq!(migrate::run().exit_code, 0, "migrations should apply");

        let result = map_stage::run(9999, "CLOSED");
        assert_eq!(result.exit_code, 5);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "stage_mapping");
    });
}

#[test]
fn logs_reports_an_empty_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("leadsync.db").display());
    let env_vars: Vec<(&str, &str)> = VALID_ENV
        .iter()
        .map(|(key, value)| if *key == "LEADSYNC_DATABASE_URL" { (*key, db_url.as_str()) } else { (*key, *value) })
        .collect();

    with_env(&env_vars, || {
        assert_eq!(migrate::run().exit_code, 0, "migrations should apply");
        assert_eq!(logs::run(20), "no sync runs recorded yet");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "LEADSYNC_DATABASE_URL",
        "LEADSYNC_DATABASE_MAX_CONNECTIONS",
        "LEADSYNC_DATABASE_TIMEOUT_SECS",
        "LEADSYNC_AMO_ACCOUNT_ID",
        "LEADSYNC_AMO_BASE_DOMAIN",
        "LEADSYNC_AMO_CLIENT_ID",
        "LEADSYNC_AMO_CLIENT_SECRET",
        "LEADSYNC_AMO_REDIRECT_URI",
        "LEADSYNC_SYNC_PAGE_SIZE",
        "LEADSYNC_SYNC_TOKEN_SAFETY_MARGIN_SECS",
        "LEADSYNC_SYNC_REQUEST_TIMEOUT_SECS",
        "LEADSYNC_SYNC_SCHEDULE_INTERVAL_SECS",
        "LEADSYNC_LOGGING_LEVEL",
        "LEADSYNC_LOGGING_FORMAT",
        "LEADSYNC_LOG_LEVEL",
        "LEADSYNC_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
