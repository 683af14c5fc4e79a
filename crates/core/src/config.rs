use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub amo: AmoConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Credentials and addressing for one connected amoCRM account.
#[derive(Clone, Debug)]
pub struct AmoConfig {
    pub account_id: String,
    pub base_domain: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub page_size: u32,
    pub token_safety_margin_secs: i64,
    pub request_timeout_secs: u64,
    pub schedule_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub amo_account_id: Option<String>,
    pub amo_base_domain: Option<String>,
    pub amo_client_id: Option<String>,
    pub amo_client_secret: Option<String>,
    pub sync_page_size: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadsync.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            amo: AmoConfig {
                account_id: String::new(),
                base_domain: String::new(),
                client_id: String::new(),
                client_secret: String::new().into(),
                redirect_uri: String::new(),
            },
            sync: SyncConfig {
                page_size: 250,
                token_safety_margin_secs: 300,
                request_timeout_secs: 30,
                schedule_interval_secs: 3600,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadsync.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(amo) = patch.amo {
            if let Some(account_id) = amo.account_id {
                self.amo.account_id = account_id;
            }
            if let Some(base_domain) = amo.base_domain {
                self.amo.base_domain = base_domain;
            }
            if let Some(client_id) = amo.client_id {
                self.amo.client_id = client_id;
            }
            if let Some(client_secret_value) = amo.client_secret {
                self.amo.client_secret = client_secret_value.into();
            }
            if let Some(redirect_uri) = amo.redirect_uri {
                self.amo.redirect_uri = redirect_uri;
            }
        }

        if let Some(sync) = patch.sync {
            if let Some(page_size) = sync.page_size {
                self.sync.page_size = page_size;
            }
            if let Some(margin) = sync.token_safety_margin_secs {
                self.sync.token_safety_margin_secs = margin;
            }
            if let Some(timeout) = sync.request_timeout_secs {
                self.sync.request_timeout_secs = timeout;
            }
            if let Some(interval) = sync.schedule_interval_secs {
                self.sync.schedule_interval_secs = interval;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADSYNC_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADSYNC_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LEADSYNC_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADSYNC_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LEADSYNC_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADSYNC_AMO_ACCOUNT_ID") {
            self.amo.account_id = value;
        }
        if let Some(value) = read_env("LEADSYNC_AMO_BASE_DOMAIN") {
            self.amo.base_domain = value;
        }
        if let Some(value) = read_env("LEADSYNC_AMO_CLIENT_ID") {
            self.amo.client_id = value;
        }
        if let Some(value) = read_env("LEADSYNC_AMO_CLIENT_SECRET") {
            self.amo.client_secret = value.into();
        }
        if let Some(value) = read_env("LEADSYNC_AMO_REDIRECT_URI") {
            self.amo.redirect_uri = value;
        }

        if let Some(value) = read_env("LEADSYNC_SYNC_PAGE_SIZE") {
            self.sync.page_size = parse_u32("LEADSYNC_SYNC_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("LEADSYNC_SYNC_TOKEN_SAFETY_MARGIN_SECS") {
            self.sync.token_safety_margin_secs =
                parse_i64("LEADSYNC_SYNC_TOKEN_SAFETY_MARGIN_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADSYNC_SYNC_REQUEST_TIMEOUT_SECS") {
            self.sync.request_timeout_secs =
                parse_u64("LEADSYNC_SYNC_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADSYNC_SYNC_SCHEDULE_INTERVAL_SECS") {
            self.sync.schedule_interval_secs =
                parse_u64("LEADSYNC_SYNC_SCHEDULE_INTERVAL_SECS", &value)?;
        }

        let log_level =
            read_env("LEADSYNC_LOGGING_LEVEL").or_else(|| read_env("LEADSYNC_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADSYNC_LOGGING_FORMAT").or_else(|| read_env("LEADSYNC_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(account_id) = overrides.amo_account_id {
            self.amo.account_id = account_id;
        }
        if let Some(base_domain) = overrides.amo_base_domain {
            self.amo.base_domain = base_domain;
        }
        if let Some(client_id) = overrides.amo_client_id {
            self.amo.client_id = client_id;
        }
        if let Some(client_secret) = overrides.amo_client_secret {
            self.amo.client_secret = client_secret.into();
        }
        if let Some(page_size) = overrides.sync_page_size {
            self.sync.page_size = page_size;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_amo(&self.amo)?;
        validate_sync(&self.sync)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadsync.toml"), PathBuf::from("config/leadsync.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_amo(amo: &AmoConfig) -> Result<(), ConfigError> {
    if amo.account_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "amo.account_id is required (your amoCRM account id)".to_string(),
        ));
    }

    if amo.base_domain.trim().is_empty() {
        return Err(ConfigError::Validation(
            "amo.base_domain is required (e.g. `yourcompany.amocrm.ru`)".to_string(),
        ));
    }
    if amo.base_domain.contains("://") {
        return Err(ConfigError::Validation(
            "amo.base_domain must be a bare host, without an http(s):// scheme".to_string(),
        ));
    }

    if amo.client_id.trim().is_empty() {
        return Err(ConfigError::Validation(
            "amo.client_id is required. Get it from your amoCRM integration settings".to_string(),
        ));
    }
    if amo.client_secret.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "amo.client_secret is required. Get it from your amoCRM integration settings"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_sync(sync: &SyncConfig) -> Result<(), ConfigError> {
    // amoCRM caps list endpoints at 250 records per page.
    if sync.page_size == 0 || sync.page_size > 250 {
        return Err(ConfigError::Validation(
            "sync.page_size must be in range 1..=250".to_string(),
        ));
    }

    if sync.token_safety_margin_secs < 0 {
        return Err(ConfigError::Validation(
            "sync.token_safety_margin_secs must not be negative".to_string(),
        ));
    }

    if sync.request_timeout_secs == 0 || sync.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "sync.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if sync.schedule_interval_secs < 60 {
        return Err(ConfigError::Validation(
            "sync.schedule_interval_secs must be at least 60".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    amo: Option<AmoPatch>,
    sync: Option<SyncPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AmoPatch {
    account_id: Option<String>,
    base_domain: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SyncPatch {
    page_size: Option<u32>,
    token_safety_margin_secs: Option<i64>,
    request_timeout_secs: Option<u64>,
    schedule_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn set_required_amo_vars() {
        env::set_var("LEADSYNC_AMO_ACCOUNT_ID", "31920194");
        env::set_var("LEADSYNC_AMO_BASE_DOMAIN", "testco.amocrm.ru");
        env::set_var("LEADSYNC_AMO_CLIENT_ID", "client-id");
        env::set_var("LEADSYNC_AMO_CLIENT_SECRET", "client-secret");
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    const AMO_VARS: &[&str] = &[
        "LEADSYNC_AMO_ACCOUNT_ID",
        "LEADSYNC_AMO_BASE_DOMAIN",
        "LEADSYNC_AMO_CLIENT_ID",
        "LEADSYNC_AMO_CLIENT_SECRET",
    ];

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_AMO_SECRET", "secret-from-env");
        set_required_amo_vars();

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadsync.toml");
            fs::write(
                &path,
                r#"
[amo]
client_secret = "${TEST_AMO_SECRET}"
"#,
            )
            .map_err(|err| err.to_string())?;

            // Env override wins over the file, so drop the env secret for this case.
            env::remove_var("LEADSYNC_AMO_CLIENT_SECRET");

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.amo.client_secret.expose_secret() == "secret-from-env",
                "client secret should be interpolated from environment",
            )?;
            Ok(())
        })();

        clear_vars(AMO_VARS);
        clear_vars(&["TEST_AMO_SECRET"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_amo_vars();
        env::set_var("LEADSYNC_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadsync.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            Ok(())
        })();

        clear_vars(AMO_VARS);
        clear_vars(&["LEADSYNC_DATABASE_URL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_amo_vars();
        env::set_var("LEADSYNC_AMO_BASE_DOMAIN", "https://testco.amocrm.ru");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("amo.base_domain")
            );
            ensure(has_message, "validation failure should mention amo.base_domain")
        })();

        clear_vars(AMO_VARS);
        result
    }

    #[test]
    fn page_size_is_capped_at_the_api_limit() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_amo_vars();
        env::set_var("LEADSYNC_SYNC_PAGE_SIZE", "500");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("page_size over 250 should be rejected".to_string()),
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("sync.page_size")
            );
            ensure(has_message, "validation failure should mention sync.page_size")
        })();

        clear_vars(AMO_VARS);
        clear_vars(&["LEADSYNC_SYNC_PAGE_SIZE"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        set_required_amo_vars();
        env::set_var("LEADSYNC_AMO_CLIENT_SECRET", "very-secret-value");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("very-secret-value"),
                "debug output should not contain the client secret",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(AMO_VARS);
        result
    }
}
