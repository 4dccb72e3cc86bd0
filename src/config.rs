//! Console configuration.
//!
//! Loaded from a TOML file (`console.toml` by default, or the path in
//! `EVENT_CONSOLE_CONFIG`). Every section falls back to its defaults, so an
//! empty or missing file yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

pub const CONFIG_ENV: &str = "EVENT_CONSOLE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "console.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub groups: GroupConfig,
    pub store: StoreConfig,
    pub tokens: TokenConfig,
    pub server: ServerConfig,
}

impl ConsoleConfig {
    /// Loads the configuration file if present, then applies environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_from(&path)?;
        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            config.server.admin_password = password;
        }
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded console config");
        Ok(config)
    }
}

/// Labels and keys used when grouping team leaders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// Group label that selects every absent leader.
    pub cancel_label: String,
    /// Raw group key that selects every staff leader.
    pub staff_key: String,
    /// Display label that also selects every staff leader.
    pub staff_label: String,
    /// Meta label shown for absent leaders.
    pub absent_meta: String,
    /// Meta label shown for staff leaders.
    pub staff_meta: String,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            cancel_label: "キャンセル".to_string(),
            staff_key: "__staff".to_string(),
            staff_label: "運営".to_string(),
            absent_meta: "欠席".to_string(),
            staff_meta: "運営".to_string(),
        }
    }
}

/// Store path templates. `{event}` is replaced with the event id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub events_path: String,
    pub roster_path: String,
    pub assignments_path: String,
    pub tokens_path: String,
    /// JSON document backing the file store used by the binary.
    pub document: PathBuf,
}

impl StoreConfig {
    pub fn roster_path_for(&self, event_id: &str) -> String {
        self.roster_path.replace("{event}", event_id)
    }

    pub fn assignments_path_for(&self, event_id: &str) -> String {
        self.assignments_path.replace("{event}", event_id)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            events_path: "questionIntake/events".to_string(),
            roster_path: "glIntake/applications/{event}".to_string(),
            assignments_path: "glAssignments/{event}".to_string(),
            tokens_path: "questionIntake/tokens".to_string(),
            document: PathBuf::from("data/store.json"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub snapshot_ttl_secs: u64,
    pub min_length: usize,
}

impl TokenConfig {
    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.snapshot_ttl_secs)
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            snapshot_ttl_secs: 10,
            min_length: 12,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub admin_password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            admin_password: "admin123".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.groups.cancel_label, "キャンセル");
        assert_eq!(config.groups.staff_key, "__staff");
        assert_eq!(config.tokens.snapshot_ttl(), Duration::from_secs(10));
        assert_eq!(config.tokens.min_length, 12);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: ConsoleConfig = toml::from_str(
            r#"
            [groups]
            cancel_label = "Cancelled"

            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.groups.cancel_label, "Cancelled");
        assert_eq!(config.groups.staff_label, "運営");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.store.roster_path_for("E1"), "glIntake/applications/E1");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConsoleConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.store.assignments_path_for("E2"), "glAssignments/E2");
    }
}
