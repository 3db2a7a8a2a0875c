//! Configuration loader and validator for the Canvas deadline tracker.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable that, when set, replaces `canvas.token` from the file.
pub const TOKEN_ENV: &str = "CANVAS_API_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub canvas: Canvas,
}

/// App-level settings: storage location and timer cadence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_notify_interval_secs")]
    pub notify_interval_secs: u64,
    #[serde(default = "default_rotation_interval_secs")]
    pub rotation_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Whether dismissed assignments still get due-date reminders.
    #[serde(default = "default_true")]
    pub notify_dismissed: bool,
    #[serde(default)]
    pub notifier: NotifierKind,
}

/// Where reminder notifications are delivered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    /// Only write reminders to the log.
    #[default]
    Log,
    /// Run `notify-send` for each reminder.
    Command,
}

/// Canvas API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Canvas {
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub endpoint: Endpoint,
}

/// Which upstream listing the assignments are read from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    #[default]
    Planner,
    UpcomingEvents,
}

fn default_days_ahead() -> u32 {
    14
}

fn default_refresh_interval_secs() -> u64 {
    30 * 60
}

fn default_notify_interval_secs() -> u64 {
    60
}

fn default_rotation_interval_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    20
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.app.refresh_interval_secs)
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_secs(self.app.notify_interval_secs)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.app.rotation_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.app.fetch_timeout_secs)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - `CANVAS_API_TOKEN`, when set and non-empty, overrides `canvas.token`.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            cfg.canvas.token = token;
        }
    }
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.days_ahead == 0 {
        return Err(ConfigError::Invalid("app.days_ahead must be > 0"));
    }
    if cfg.app.refresh_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.refresh_interval_secs must be > 0"));
    }
    if cfg.app.notify_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.notify_interval_secs must be > 0"));
    }
    // The ±5 minute threshold tolerance only guarantees a hit if we look at
    // least once every ten minutes.
    if cfg.app.notify_interval_secs > 10 * 60 {
        return Err(ConfigError::Invalid(
            "app.notify_interval_secs must be <= 600",
        ));
    }
    if cfg.app.rotation_interval_secs == 0 {
        return Err(ConfigError::Invalid("app.rotation_interval_secs must be > 0"));
    }
    if cfg.app.fetch_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.fetch_timeout_secs must be > 0"));
    }
    if cfg.app.fetch_timeout_secs >= cfg.app.refresh_interval_secs {
        return Err(ConfigError::Invalid(
            "app.fetch_timeout_secs must be shorter than app.refresh_interval_secs",
        ));
    }

    let base = cfg.canvas.base_url.trim();
    if base.is_empty() {
        return Err(ConfigError::Invalid("canvas.base_url must be non-empty"));
    }
    if reqwest::Url::parse(base).is_err() {
        return Err(ConfigError::Invalid("canvas.base_url must be an absolute URL"));
    }
    if cfg.canvas.token.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "canvas.token must be non-empty (or set CANVAS_API_TOKEN)",
        ));
    }

    Ok(())
}

/// Returns a sample YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  days_ahead: 14
  refresh_interval_secs: 1800
  notify_interval_secs: 60
  rotation_interval_secs: 30
  fetch_timeout_secs: 20
  notify_dismissed: true
  notifier: log

canvas:
  base_url: "https://canvas.example.edu"
  token: "YOUR_CANVAS_API_TOKEN"
  endpoint: planner
"#
}
