//! Config loading and persistence.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Time;

use crate::core::{DeskHours, InvalidHours, SlotTime};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config: {source}")]
    Render {
        #[source]
        source: toml::ser::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid desk time {raw:?} for {field}")]
    DeskTime { field: &'static str, raw: String },

    #[error(transparent)]
    Hours(#[from] InvalidHours),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub desk: DeskConfig,
    pub limits: Limits,
    pub logging: LoggingConfig,
    pub admin: AdminConfig,
}

/// Opening hours and the visible booking window, as `HH:MM` strings so the
/// file stays hand-editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub open: String,
    pub close: String,
    pub break_start: String,
    pub break_end: String,
    pub visible_days: usize,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            open: "09:00".to_string(),
            close: "18:00".to_string(),
            break_start: "12:00".to_string(),
            break_end: "14:00".to_string(),
            visible_days: 3,
        }
    }
}

impl DeskConfig {
    pub fn hours(&self) -> Result<DeskHours, ConfigError> {
        Ok(DeskHours::new(
            parse_time("open", &self.open)?,
            parse_time("close", &self.close)?,
            parse_time("break_start", &self.break_start)?,
            parse_time("break_end", &self.break_end)?,
        )?)
    }
}

fn parse_time(field: &'static str, raw: &str) -> Result<Time, ConfigError> {
    SlotTime::parse(raw)
        .map(|t| t.time())
        .map_err(|_| ConfigError::DeskTime {
            field,
            raw: raw.to_string(),
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_subscribers: usize,
    pub subscriber_queue_events: usize,
    pub heartbeat_secs: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_subscribers: 64,
            subscriber_queue_events: 256,
            heartbeat_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    pub file: FileLoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
}

/// Admin password for `admin_verify`; unset disables verification.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdminConfig {
    pub password: Option<String>,
}

pub fn config_path() -> PathBuf {
    crate::paths::config_dir().join("config.toml")
}

pub fn load() -> Result<Config, ConfigError> {
    let path = config_path();
    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

pub fn load_or_init() -> Config {
    let path = config_path();
    if path.exists() {
        match load() {
            Ok(cfg) => return cfg,
            Err(e) => {
                tracing::warn!("config load failed, using defaults: {e}");
                return Config::default();
            }
        }
    }

    let cfg = Config::default();
    if let Err(e) = write_config(&path, &cfg) {
        tracing::warn!("failed to write default config: {e}");
    }
    cfg
}

pub fn write_config(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let contents = toml::to_string_pretty(cfg).map_err(|source| ConfigError::Render { source })?;
    atomic_write(path, contents.as_bytes())
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let temp = tempfile::NamedTempFile::new_in(dir).map_err(|source| ConfigError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    fs::write(temp.path(), data).map_err(|source| ConfigError::Write {
        path: temp.path().to_path_buf(),
        source,
    })?;
    temp.persist(path).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let cfg = Config {
            desk: DeskConfig {
                open: "08:00".to_string(),
                close: "17:00".to_string(),
                break_start: "11:30".to_string(),
                break_end: "13:00".to_string(),
                visible_days: 5,
            },
            limits: Limits {
                max_subscribers: 7,
                subscriber_queue_events: 16,
                heartbeat_secs: 2,
            },
            logging: LoggingConfig::default(),
            admin: AdminConfig {
                password: Some("hunter2hunter2".to_string()),
            },
        };
        write_config(&path, &cfg).expect("write config");

        let contents = fs::read_to_string(&path).expect("read config");
        let loaded: Config = toml::from_str(&contents).expect("parse config");
        assert_eq!(loaded.desk.open, "08:00");
        assert_eq!(loaded.desk.visible_days, 5);
        assert_eq!(loaded.limits.max_subscribers, 7);
        assert_eq!(loaded.admin.password.as_deref(), Some("hunter2hunter2"));
    }

    #[test]
    fn default_desk_hours_parse() {
        let hours = DeskConfig::default().hours().expect("default hours");
        assert_eq!(hours.slots().len(), 28);
    }

    #[test]
    fn bad_desk_time_is_rejected() {
        let mut desk = DeskConfig::default();
        desk.open = "9am".to_string();
        assert!(matches!(
            desk.hours(),
            Err(ConfigError::DeskTime { field: "open", .. })
        ));
    }
}
