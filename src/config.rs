//! Runtime configuration: TOML file, environment overrides, CLI precedence.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::notifications::models::ChannelConfig;

pub const APP_NAME: &str = "ipmon";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}: the specified configuration file does not exist")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Notification backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyMethod {
    Ntfy,
    Smsbox,
}

/// One monitored IP address.
#[derive(Debug, Clone, Deserialize)]
pub struct IpTarget {
    pub ip: String,
    pub description: String,
}

/// One monitored URL.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlTarget {
    pub url: String,
    pub description: String,
}

/// Settings for the ntfy push backend.
#[derive(Debug, Clone, Deserialize)]
pub struct NtfyConfig {
    pub server: String,
    pub topic: String,
}

/// Settings for the SMSBox gateway backend.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsboxConfig {
    pub api_key: String,
    pub recipient: String,
}

/// Validated configuration snapshot, immutable for the duration of one run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    pub notify_method: NotifyMethod,
    #[serde(default)]
    pub ntfy: Option<NtfyConfig>,
    #[serde(default)]
    pub smsbox: Option<SmsboxConfig>,
    #[serde(default)]
    pub ips: Vec<IpTarget>,
    #[serde(default)]
    pub urls: Vec<UrlTarget>,
    #[serde(default = "default_precheck_enabled")]
    pub precheck_enabled: bool,
    #[serde(default = "default_precheck_timeout")]
    pub precheck_timeout: f64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: f64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout: f64,
    #[serde(default = "default_http_connector_limit")]
    pub http_connector_limit: usize,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data").join("ipmon.db")
}

fn default_precheck_enabled() -> bool {
    true
}

fn default_precheck_timeout() -> f64 {
    10.0
}

fn default_ping_timeout() -> f64 {
    15.0
}

fn default_http_timeout() -> f64 {
    7.0
}

fn default_http_connector_limit() -> usize {
    50
}

fn default_concurrency() -> usize {
    20
}

impl Config {
    /// Loads and validates the configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notify_method == NotifyMethod::Ntfy && self.ntfy.is_none() {
            return Err(ConfigError::Invalid(
                "an [ntfy] section must be provided when notify_method is \"ntfy\"".into(),
            ));
        }
        if self.notify_method == NotifyMethod::Smsbox && self.smsbox.is_none() {
            return Err(ConfigError::Invalid(
                "an [smsbox] section must be provided when notify_method is \"smsbox\"".into(),
            ));
        }
        if self.ips.is_empty() && self.urls.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one of [[ips]] or [[urls]] must have an entry".into(),
            ));
        }
        for (name, value) in [
            ("precheck_timeout", self.precheck_timeout),
            ("ping_timeout", self.ping_timeout),
            ("http_timeout", self.http_timeout),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }
        if self.http_connector_limit == 0 {
            return Err(ConfigError::Invalid(
                "http_connector_limit must be at least 1".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        self.validate_db_path()?;
        Ok(())
    }

    /// The parent directory of `db_path` must exist; the default data
    /// directory is created on first use.
    fn validate_db_path(&self) -> Result<(), ConfigError> {
        let Some(parent) = self.db_path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() || parent.is_dir() {
            return Ok(());
        }
        if self.db_path == default_db_path() {
            return fs::create_dir_all(parent).map_err(|e| {
                ConfigError::Invalid(format!("cannot create {}: {e}", parent.display()))
            });
        }
        Err(ConfigError::Invalid(format!(
            "{} does not exist or is not a directory",
            parent.display()
        )))
    }

    /// The notification channel matching `notify_method`.
    pub fn channel(&self) -> Result<ChannelConfig, ConfigError> {
        match self.notify_method {
            NotifyMethod::Ntfy => self
                .ntfy
                .as_ref()
                .map(|c| ChannelConfig::Ntfy {
                    server: c.server.clone(),
                    topic: c.topic.clone(),
                })
                .ok_or_else(|| ConfigError::Invalid("[ntfy] section missing".into())),
            NotifyMethod::Smsbox => self
                .smsbox
                .as_ref()
                .map(|c| ChannelConfig::Smsbox {
                    api_key: c.api_key.clone(),
                    recipient: c.recipient.clone(),
                })
                .ok_or_else(|| ConfigError::Invalid("[smsbox] section missing".into())),
        }
    }
}

/// Picks the configuration file path.
///
/// Search order: explicit CLI argument, `IPM_CONFIG`, `./config.toml`,
/// `/etc/ipmon/config.toml`. Falls back to `./config.toml` so the
/// not-found error names a sensible path.
pub fn discover_config_path(cli_path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = cli_path {
        return path;
    }
    if let Some(env_path) = env::var_os("IPM_CONFIG") {
        return PathBuf::from(env_path);
    }
    let cwd_candidate = PathBuf::from("config.toml");
    if cwd_candidate.exists() {
        return cwd_candidate;
    }
    let site_candidate = Path::new("/etc").join(APP_NAME).join("config.toml");
    if site_candidate.exists() {
        return site_candidate;
    }
    cwd_candidate
}

/// Effective tuning parameters for one run (CLI > environment > config file).
#[derive(Debug, Clone)]
pub struct RuntimeParams {
    pub precheck_enabled: bool,
    pub precheck_timeout: Duration,
    pub ping_timeout: Duration,
    pub http_timeout: Duration,
    pub http_connector_limit: usize,
    pub concurrency: usize,
    pub quiet: bool,
}

/// Overrides supplied on the command line; `None` means not given.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub precheck_timeout: Option<f64>,
    pub ping_timeout: Option<f64>,
    pub http_timeout: Option<f64>,
    pub http_connector_limit: Option<usize>,
    pub concurrency: Option<usize>,
    pub precheck_enabled: Option<bool>,
    pub quiet: Option<bool>,
}

/// Computes the effective parameters for one run.
///
/// Zero and negative values are not legitimate overrides for any numeric
/// knob: they are rejected with a warning at whichever precedence level they
/// appear, and the next level applies.
pub fn resolve_params(cli: &CliOverrides, config: &Config) -> RuntimeParams {
    let precheck_timeout = pick_f64(
        cli.precheck_timeout,
        "IPM_PRECHECK_TIMEOUT",
        config.precheck_timeout,
    );
    let ping_timeout = pick_f64(cli.ping_timeout, "IPM_PING_TIMEOUT", config.ping_timeout);
    let http_timeout = pick_f64(cli.http_timeout, "IPM_HTTP_TIMEOUT", config.http_timeout);
    let http_connector_limit = pick_usize(
        cli.http_connector_limit,
        "IPM_HTTP_CONNECTOR_LIMIT",
        config.http_connector_limit,
    );
    let concurrency = pick_usize(cli.concurrency, "IPM_CONCURRENCY", config.concurrency);
    let precheck_enabled = cli
        .precheck_enabled
        .or_else(|| env_bool("IPM_PRECHECK_ENABLED"))
        .unwrap_or(config.precheck_enabled);
    let quiet = cli.quiet.or_else(|| env_bool("IPM_QUIET")).unwrap_or(false);

    RuntimeParams {
        precheck_enabled,
        precheck_timeout: Duration::from_secs_f64(precheck_timeout),
        ping_timeout: Duration::from_secs_f64(ping_timeout),
        http_timeout: Duration::from_secs_f64(http_timeout),
        http_connector_limit,
        concurrency,
        quiet,
    }
}

fn pick_f64(cli_value: Option<f64>, env_name: &str, file_value: f64) -> f64 {
    match cli_value {
        Some(v) if v > 0.0 => v,
        Some(v) => {
            warn!(value = v, "ignoring non-positive command-line override");
            env_f64(env_name).unwrap_or(file_value)
        }
        None => env_f64(env_name).unwrap_or(file_value),
    }
}

fn pick_usize(cli_value: Option<usize>, env_name: &str, file_value: usize) -> usize {
    match cli_value {
        Some(v) if v >= 1 => v,
        Some(_) => {
            warn!("ignoring zero command-line override");
            env_usize(env_name).unwrap_or(file_value)
        }
        None => env_usize(env_name).unwrap_or(file_value),
    }
}

/// Positive float from the environment, if present and valid.
fn env_f64(name: &str) -> Option<f64> {
    let value = env::var(name).ok()?;
    match value.parse::<f64>() {
        Ok(v) if v > 0.0 => Some(v),
        Ok(_) => {
            warn!(name, value = %value, "ignoring non-positive environment variable");
            None
        }
        Err(_) => {
            warn!(name, value = %value, "invalid environment variable");
            None
        }
    }
}

/// Integer of at least 1 from the environment, if present and valid.
fn env_usize(name: &str) -> Option<usize> {
    let value = env::var(name).ok()?;
    match value.parse::<usize>() {
        Ok(v) if v >= 1 => Some(v),
        Ok(_) => {
            warn!(name, value = %value, "ignoring zero environment variable");
            None
        }
        Err(_) => {
            warn!(name, value = %value, "invalid environment variable");
            None
        }
    }
}

/// Boolean from the environment (1/0, true/false, yes/no, on/off).
fn env_bool(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(name, value = %value, "invalid environment variable");
            None
        }
    }
}
