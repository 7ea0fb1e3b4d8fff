// --------------------------------------------------
// Host configuration, read from a TOML file.
//
// Every field has a default, so a missing file or a partial one is fine.
// -------------------------------------------------

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::store::DEFAULT_DATA_DIR;
use crate::tasks::{DEFAULT_EXPIRY_GRACE_MS, DEFAULT_STORAGE_KEY};

// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TASK_WIDGET_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "task-widget.toml";

// How long a task may sit past its due instant before it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ExpiryPolicy {
    // A flat grace period.
    Fixed {
        #[serde(default = "default_grace_ms")]
        grace_ms: u64,
    },
    // Whatever is left of the minute the host started in, so tasks expire
    // on minute boundaries.
    MinuteAligned,
}

fn default_grace_ms() -> u64 {
    DEFAULT_EXPIRY_GRACE_MS as u64
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        ExpiryPolicy::Fixed {
            grace_ms: default_grace_ms(),
        }
    }
}

impl ExpiryPolicy {
    pub fn grace(&self, started: DateTime<FixedOffset>) -> Duration {
        match *self {
            ExpiryPolicy::Fixed { grace_ms } => {
                Duration::milliseconds(i64::try_from(grace_ms).unwrap_or(i64::MAX))
            }
            ExpiryPolicy::MinuteAligned => {
                let elapsed_ms = i64::from(started.second()) * 1000
                    + i64::from(started.timestamp_subsec_millis().min(999));
                Duration::milliseconds(60_000 - elapsed_ms)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    // Directory holding one JSON file per storage key.
    pub data_dir: PathBuf,
    pub storage_key: String,
    // Loopback address the widget API listens on.
    pub bind_addr: String,
    // Directory with the widget page, served at `/`.
    pub static_dir: PathBuf,
    pub expiry: ExpiryPolicy,
    // Length of the upcoming list.
    pub upcoming_count: usize,
    // Seconds between background expiry sweeps.
    pub sweep_interval_secs: u64,
    // How long a fired reminder stays on screen; defaults to the grace period.
    pub reminder_timeout_ms: Option<u64>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            bind_addr: "127.0.0.1:3000".to_string(),
            static_dir: PathBuf::from("static"),
            expiry: ExpiryPolicy::default(),
            upcoming_count: 5,
            sweep_interval_secs: 30,
            reminder_timeout_ms: None,
        }
    }
}

impl WidgetConfig {
    pub fn reminder_timeout(&self, grace: Duration) -> Duration {
        match self.reminder_timeout_ms {
            Some(ms) => Duration::milliseconds(i64::try_from(ms).unwrap_or(i64::MAX)),
            None => grace,
        }
    }
}

// Config file path: `$TASK_WIDGET_CONFIG`, else `task-widget.toml`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn load_config(path: &Path) -> Result<WidgetConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(WidgetConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: WidgetConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(0).unwrap();
        offset.with_ymd_and_hms(2026, 10, 18, h, m, s).unwrap() + Duration::milliseconds(i64::from(ms))
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.storage_key, "userTasks");
        assert_eq!(config.upcoming_count, 5);
        assert_eq!(config.expiry, ExpiryPolicy::Fixed { grace_ms: 59_000 });
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-widget.toml");
        std::fs::write(
            &path,
            r#"
storage_key = "work"
reminder_timeout_ms = 10000

[expiry]
policy = "minute_aligned"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage_key, "work");
        assert_eq!(config.expiry, ExpiryPolicy::MinuteAligned);
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.reminder_timeout(Duration::seconds(59)), Duration::seconds(10));
    }

    #[test]
    fn fixed_policy_without_grace_uses_the_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-widget.toml");
        std::fs::write(&path, "[expiry]\npolicy = \"fixed\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.expiry, ExpiryPolicy::Fixed { grace_ms: 59_000 });
    }

    #[test]
    fn fixed_policy_reads_its_grace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-widget.toml");
        std::fs::write(&path, "[expiry]\npolicy = \"fixed\"\ngrace_ms = 30000\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.expiry, ExpiryPolicy::Fixed { grace_ms: 30_000 });
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-widget.toml");
        std::fs::write(&path, "upcoming_count = \"many\"").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn fixed_grace_ignores_start_time() {
        let policy = ExpiryPolicy::Fixed { grace_ms: 59_000 };
        assert_eq!(policy.grace(at(9, 0, 42, 0)), Duration::seconds(59));
    }

    #[test]
    fn minute_aligned_grace_runs_to_the_next_minute() {
        let policy = ExpiryPolicy::MinuteAligned;
        assert_eq!(policy.grace(at(9, 0, 15, 250)), Duration::milliseconds(44_750));
        assert_eq!(policy.grace(at(9, 0, 0, 0)), Duration::seconds(60));
    }

    #[test]
    fn reminder_timeout_defaults_to_grace() {
        let config = WidgetConfig::default();
        assert_eq!(config.reminder_timeout(Duration::seconds(59)), Duration::seconds(59));
    }
}
