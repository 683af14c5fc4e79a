use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadsync_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "LEADSYNC_DATABASE_URL"),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", "LEADSYNC_DATABASE_MAX_CONNECTIONS"),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", "LEADSYNC_DATABASE_TIMEOUT_SECS"),
    ));

    lines.push(render_line(
        "amo.account_id",
        &config.amo.account_id,
        source("amo.account_id", "LEADSYNC_AMO_ACCOUNT_ID"),
    ));
    lines.push(render_line(
        "amo.base_domain",
        &config.amo.base_domain,
        source("amo.base_domain", "LEADSYNC_AMO_BASE_DOMAIN"),
    ));
    lines.push(render_line(
        "amo.client_id",
        &config.amo.client_id,
        source("amo.client_id", "LEADSYNC_AMO_CLIENT_ID"),
    ));
    lines.push(render_line(
        "amo.client_secret",
        &redact_secret(config.amo.client_secret.expose_secret()),
        source("amo.client_secret", "LEADSYNC_AMO_CLIENT_SECRET"),
    ));
    lines.push(render_line(
        "amo.redirect_uri",
        &config.amo.redirect_uri,
        source("amo.redirect_uri", "LEADSYNC_AMO_REDIRECT_URI"),
    ));

    lines.push(render_line(
        "sync.page_size",
        &config.sync.page_size.to_string(),
        source("sync.page_size", "LEADSYNC_SYNC_PAGE_SIZE"),
    ));
    lines.push(render_line(
        "sync.token_safety_margin_secs",
        &config.sync.token_safety_margin_secs.to_string(),
        source("sync.token_safety_margin_secs", "LEADSYNC_SYNC_TOKEN_SAFETY_MARGIN_SECS"),
    ));
    lines.push(render_line(
        "sync.request_timeout_secs",
        &config.sync.request_timeout_secs.to_string(),
        source("sync.request_timeout_secs", "LEADSYNC_SYNC_REQUEST_TIMEOUT_SECS"),
    ));
    lines.push(render_line(
        "sync.schedule_interval_secs",
        &config.sync.schedule_interval_secs.to_string(),
        source("sync.schedule_interval_secs", "LEADSYNC_SYNC_SCHEDULE_INTERVAL_SECS"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "LEADSYNC_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "LEADSYNC_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("leadsync.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/leadsync.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &str) -> String {
    if secret.trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}
