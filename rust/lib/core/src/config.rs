//! Planner configuration.
//!
//! Reads/writes `~/.cutplan/config.toml`. A missing file yields defaults so
//! a fresh install talks to a local backend out of the box.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config encode: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Settings shared by the planning session, the API client and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Backend origin, without the `/api` suffix (e.g. "http://localhost:3000").
    pub api_base_url: String,

    /// Bearer token attached to every request (set by the login flow).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub token: String,

    /// Coalescing window for layers/bagno synchronization events.
    pub sync_debounce_ms: u64,

    /// Coalescing window for expected-consumption recomputation.
    pub consumption_debounce_ms: u64,

    /// Interval of the unread-notification poll.
    pub notification_poll_secs: u64,

    /// Allowance given to new tables, in meters per layer.
    pub default_allowance: f64,

    /// Cutting rooms that ship one order to several destinations. Orders
    /// routed only through one of these rooms wait for a user filter.
    pub multi_destination_rooms: Vec<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            token: String::new(),
            sync_debounce_ms: 300,
            consumption_debounce_ms: 500,
            notification_poll_secs: 30,
            default_allowance: 0.02,
            multi_destination_rooms: vec!["ZALLI".to_string()],
        }
    }
}

impl PlannerConfig {
    /// Default config file path: ~/.cutplan/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk, or return defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to disk, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn sync_debounce(&self) -> Duration {
        Duration::from_millis(self.sync_debounce_ms)
    }

    pub fn consumption_debounce(&self) -> Duration {
        Duration::from_millis(self.consumption_debounce_ms)
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_poll_secs)
    }

    pub fn is_multi_destination_room(&self, cutting_room: &str) -> bool {
        self.multi_destination_rooms
            .iter()
            .any(|r| r.eq_ignore_ascii_case(cutting_room))
    }
}

/// Return the planner config directory (~/.cutplan).
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".cutplan")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.sync_debounce(), Duration::from_millis(300));
        assert_eq!(config.consumption_debounce(), Duration::from_millis(500));
        assert_eq!(config.notification_interval(), Duration::from_secs(30));
        assert_eq!(config.default_allowance, 0.02);
        assert!(config.is_multi_destination_room("ZALLI"));
        assert!(config.is_multi_destination_room("zalli"));
        assert!(!config.is_multi_destination_room("SU"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = PlannerConfig::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, PlannerConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_base_url = \"http://planning:8080\"\nsync_debounce_ms = 150\n").unwrap();

        let config = PlannerConfig::load(&path).unwrap();
        assert_eq!(config.api_base_url, "http://planning:8080");
        assert_eq!(config.sync_debounce_ms, 150);
        assert_eq!(config.consumption_debounce_ms, 500);
        assert_eq!(config.multi_destination_rooms, vec!["ZALLI".to_string()]);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = PlannerConfig {
            token: "jwt".into(),
            multi_destination_rooms: vec!["ZALLI".into(), "SU".into()],
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PlannerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_bad_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "sync_debounce_ms = \"soon\"").unwrap();
        assert!(matches!(PlannerConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
