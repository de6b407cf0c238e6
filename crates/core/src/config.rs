use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub relay: RelayConfig,
    pub engine: EngineConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

/// Bootstrap relay credentials and the supervisor restart policy.
///
/// Credentials may also live in the store (saved through the admin surface);
/// these values seed the store on first start when both are present.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub app_id: Option<String>,
    pub app_secret: Option<SecretString>,
    pub restart_max_retries: u32,
    pub restart_base_delay_ms: u64,
    pub restart_max_delay_ms: u64,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Process-level producer credential; resolves the owner partition for
    /// intents created by this process.
    pub api_key: Option<SecretString>,
    /// How long a producer's synchronous wait blocks before returning a
    /// timed-out result.
    pub answer_timeout_secs: u64,
    /// Fallback re-check interval for the producer wait loop.
    pub wait_poll_interval_ms: u64,
    /// Terminal intents older than this are evicted by the sweep.
    pub retention_days: u32,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
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
    pub api_key: Option<String>,
    pub relay_app_id: Option<String>,
    pub relay_app_secret: Option<String>,
    pub answer_timeout_secs: Option<u64>,
    pub retention_days: Option<u32>,
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
                url: "sqlite://askbridge.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            relay: RelayConfig {
                app_id: None,
                app_secret: None,
                restart_max_retries: 5,
                restart_base_delay_ms: 250,
                restart_max_delay_ms: 5_000,
            },
            engine: EngineConfig {
                api_key: None,
                answer_timeout_secs: 3_000,
                wait_poll_interval_ms: 1_000,
                retention_days: 3,
                sweep_interval_secs: 3_600,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8765 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("askbridge.toml"));
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

        if let Some(relay) = patch.relay {
            if let Some(app_id) = relay.app_id {
                self.relay.app_id = Some(app_id);
            }
            if let Some(app_secret_value) = relay.app_secret {
                self.relay.app_secret = Some(secret_value(app_secret_value));
            }
            if let Some(restart_max_retries) = relay.restart_max_retries {
                self.relay.restart_max_retries = restart_max_retries;
            }
            if let Some(restart_base_delay_ms) = relay.restart_base_delay_ms {
                self.relay.restart_base_delay_ms = restart_base_delay_ms;
            }
            if let Some(restart_max_delay_ms) = relay.restart_max_delay_ms {
                self.relay.restart_max_delay_ms = restart_max_delay_ms;
            }
        }

        if let Some(engine) = patch.engine {
            if let Some(api_key_value) = engine.api_key {
                self.engine.api_key = Some(secret_value(api_key_value));
            }
            if let Some(answer_timeout_secs) = engine.answer_timeout_secs {
                self.engine.answer_timeout_secs = answer_timeout_secs;
            }
            if let Some(wait_poll_interval_ms) = engine.wait_poll_interval_ms {
                self.engine.wait_poll_interval_ms = wait_poll_interval_ms;
            }
            if let Some(retention_days) = engine.retention_days {
                self.engine.retention_days = retention_days;
            }
            if let Some(sweep_interval_secs) = engine.sweep_interval_secs {
                self.engine.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("ASKBRIDGE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ASKBRIDGE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env::<u32>("ASKBRIDGE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ASKBRIDGE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env::<u64>("ASKBRIDGE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ASKBRIDGE_RELAY_APP_ID") {
            self.relay.app_id = Some(value);
        }
        if let Some(value) = read_env("ASKBRIDGE_RELAY_APP_SECRET") {
            self.relay.app_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("ASKBRIDGE_RELAY_RESTART_MAX_RETRIES") {
            self.relay.restart_max_retries =
                parse_env::<u32>("ASKBRIDGE_RELAY_RESTART_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("ASKBRIDGE_API_KEY") {
            self.engine.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("ASKBRIDGE_ANSWER_TIMEOUT_SECS") {
            self.engine.answer_timeout_secs = parse_env::<u64>("ASKBRIDGE_ANSWER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("ASKBRIDGE_WAIT_POLL_INTERVAL_MS") {
            self.engine.wait_poll_interval_ms =
                parse_env::<u64>("ASKBRIDGE_WAIT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("ASKBRIDGE_RETENTION_DAYS") {
            self.engine.retention_days = parse_env::<u32>("ASKBRIDGE_RETENTION_DAYS", &value)?;
        }
        if let Some(value) = read_env("ASKBRIDGE_SWEEP_INTERVAL_SECS") {
            self.engine.sweep_interval_secs = parse_env::<u64>("ASKBRIDGE_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("ASKBRIDGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("ASKBRIDGE_SERVER_PORT") {
            self.server.port = parse_env::<u16>("ASKBRIDGE_SERVER_PORT", &value)?;
        }

        let log_level =
            read_env("ASKBRIDGE_LOGGING_LEVEL").or_else(|| read_env("ASKBRIDGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ASKBRIDGE_LOGGING_FORMAT").or_else(|| read_env("ASKBRIDGE_LOG_FORMAT"));
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
        if let Some(api_key) = overrides.api_key {
            self.engine.api_key = Some(secret_value(api_key));
        }
        if let Some(relay_app_id) = overrides.relay_app_id {
            self.relay.app_id = Some(relay_app_id);
        }
        if let Some(relay_app_secret) = overrides.relay_app_secret {
            self.relay.app_secret = Some(secret_value(relay_app_secret));
        }
        if let Some(answer_timeout_secs) = overrides.answer_timeout_secs {
            self.engine.answer_timeout_secs = answer_timeout_secs;
        }
        if let Some(retention_days) = overrides.retention_days {
            self.engine.retention_days = retention_days;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_relay(&self.relay)?;
        validate_engine(&self.engine)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("askbridge.toml"), PathBuf::from("config/askbridge.toml")]
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

fn validate_relay(relay: &RelayConfig) -> Result<(), ConfigError> {
    match (&relay.app_id, &relay.app_secret) {
        (Some(app_id), Some(app_secret)) => {
            if app_id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "relay.app_id must not be empty when set".to_string(),
                ));
            }
            if app_secret.expose_secret().trim().is_empty() {
                return Err(ConfigError::Validation(
                    "relay.app_secret must not be empty when set".to_string(),
                ));
            }
        }
        (None, None) => {}
        _ => {
            return Err(ConfigError::Validation(
                "relay.app_id and relay.app_secret must be configured together".to_string(),
            ));
        }
    }

    if relay.restart_base_delay_ms > relay.restart_max_delay_ms {
        return Err(ConfigError::Validation(
            "relay.restart_base_delay_ms must not exceed relay.restart_max_delay_ms".to_string(),
        ));
    }

    Ok(())
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if engine.answer_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "engine.answer_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if engine.wait_poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "engine.wait_poll_interval_ms must be greater than zero".to_string(),
        ));
    }

    if engine.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "engine.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }

    if let Some(api_key) = &engine.api_key {
        if !api_key.expose_secret().starts_with("uk_") {
            return Err(ConfigError::Validation(
                "engine.api_key must be a partition credential starting with `uk_`".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation(
            "server.bind_address must not be empty".to_string(),
        ));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation(
            "server.port must be greater than zero".to_string(),
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

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    relay: Option<RelayPatch>,
    engine: Option<EnginePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RelayPatch {
    app_id: Option<String>,
    app_secret: Option<String>,
    restart_max_retries: Option<u32>,
    restart_base_delay_ms: Option<u64>,
    restart_max_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    api_key: Option<String>,
    answer_timeout_secs: Option<u64>,
    wait_poll_interval_ms: Option<u64>,
    retention_days: Option<u32>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
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

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate_without_any_sources() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.engine.answer_timeout_secs == 3_000, "default answer timeout is 3000s")?;
        ensure(config.engine.retention_days == 3, "default retention is 3 days")?;
        ensure(config.relay.app_id.is_none(), "relay credentials default to unset")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_RELAY_APP_ID", "cli_from_env");
        env::set_var("TEST_RELAY_APP_SECRET", "secret-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("askbridge.toml");
            fs::write(
                &path,
                r#"
[relay]
app_id = "${TEST_RELAY_APP_ID}"
app_secret = "${TEST_RELAY_APP_SECRET}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.relay.app_id.as_deref() == Some("cli_from_env"),
                "app id should be loaded from environment",
            )?;
            ensure(
                config
                    .relay
                    .app_secret
                    .as_ref()
                    .map(|secret| secret.expose_secret() == "secret-from-env")
                    .unwrap_or(false),
                "app secret should be loaded from environment",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_RELAY_APP_ID", "TEST_RELAY_APP_SECRET"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ASKBRIDGE_DATABASE_URL", "sqlite://from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("askbridge.toml");
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

        clear_vars(&["ASKBRIDGE_DATABASE_URL"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ASKBRIDGE_LOG_LEVEL", "warn");
        env::set_var("ASKBRIDGE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should come from env")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty log format should come from env",
            )?;
            Ok(())
        })();

        clear_vars(&["ASKBRIDGE_LOG_LEVEL", "ASKBRIDGE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn half_configured_relay_credentials_fail_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ASKBRIDGE_RELAY_APP_ID", "cli_only_id");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("configured together")
            );
            ensure(has_message, "validation failure should mention the credential pair")
        })();

        clear_vars(&["ASKBRIDGE_RELAY_APP_ID"]);
        result
    }

    #[test]
    fn producer_api_key_must_be_a_partition_credential() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ASKBRIDGE_API_KEY", "not-a-credential");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("uk_")
            );
            ensure(has_message, "validation failure should mention the credential format")
        })();

        clear_vars(&["ASKBRIDGE_API_KEY"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ASKBRIDGE_RELAY_APP_ID", "cli_debug");
        env::set_var("ASKBRIDGE_RELAY_APP_SECRET", "relay-secret-value");
        env::set_var("ASKBRIDGE_API_KEY", "uk_0123456789abcdef0123456789abcdef");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("relay-secret-value"),
                "debug output should not contain the relay secret",
            )?;
            ensure(
                !debug.contains("uk_0123456789abcdef0123456789abcdef"),
                "debug output should not contain the producer credential",
            )?;
            Ok(())
        })();

        clear_vars(&["ASKBRIDGE_RELAY_APP_ID", "ASKBRIDGE_RELAY_APP_SECRET", "ASKBRIDGE_API_KEY"]);
        result
    }
}
