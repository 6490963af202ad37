use serde::Deserialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::common::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "rail-postproc.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub artifacts: ArtifactSettings,
    pub queue: QueueSettings,
    pub logging: LoggingSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    pub enabled: bool,
    pub workers: usize,
    pub ping_timeout_ms: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { enabled: true, workers: 4, ping_timeout_ms: 500 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: PathBuf,
    pub file_name: String,
    /// Directive used when RUST_LOG is unset
    pub default_directive: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            file_name: "rail-postproc.log".to_string(),
            default_directive: "rail_postproc=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
}

impl Settings {
    /// Load from `path` (or `rail-postproc.toml`), then apply environment
    /// overrides. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut settings = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Settings::default(),
            Err(source) => {
                return Err(ConfigError::Io { path: path.display().to_string(), source });
            }
        };
        settings.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply `RAIL_POSTPROC_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("RAIL_POSTPROC_ARTIFACT_DIR") {
            self.artifacts.dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup("RAIL_POSTPROC_QUEUE_ENABLED") {
            self.queue.enabled = parse_bool("RAIL_POSTPROC_QUEUE_ENABLED", &value)?;
        }
        if let Some(value) = lookup("RAIL_POSTPROC_QUEUE_WORKERS") {
            self.queue.workers = parse_number("RAIL_POSTPROC_QUEUE_WORKERS", &value)?;
        }
        if let Some(value) = lookup("RAIL_POSTPROC_QUEUE_PING_MS") {
            self.queue.ping_timeout_ms = parse_number("RAIL_POSTPROC_QUEUE_PING_MS", &value)?;
        }
        if let Some(dir) = lookup("RAIL_POSTPROC_LOG_DIR") {
            self.logging.dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("RAIL_POSTPROC_METRICS") {
            self.metrics.enabled = parse_bool("RAIL_POSTPROC_METRICS", &value)?;
        }
        Ok(())
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.artifacts
            .dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("rail_postproc"))
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }
}
