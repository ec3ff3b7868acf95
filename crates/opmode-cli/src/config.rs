//! TOML bootstrap configuration
//!
//! ```toml
//! state_file = "/var/lib/audit-tool/opmode.json"
//! log_filter = "opmode_core=debug"
//! json_logs = false
//!
//! [settings]
//! maxConsecutiveFailures = 5
//! showNotifications = false
//! ```

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default state file, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = "opmode-state.json";

/// Default log directive when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Where mode and settings are persisted
    pub state_file: Option<PathBuf>,
    /// `tracing` filter directive
    pub log_filter: Option<String>,
    /// Emit JSON log lines
    pub json_logs: bool,
    /// Settings applied at startup, same field names as the persisted layout
    pub settings: Option<toml::Table>,
}

impl CliConfig {
    /// Read and parse `path`
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parse TOML text
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// State file, falling back to [`DEFAULT_STATE_FILE`]
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    /// Log filter, falling back to [`DEFAULT_LOG_FILTER`]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    /// Startup settings as an untyped map for the controller
    pub fn settings_value(&self) -> anyhow::Result<Option<serde_json::Value>> {
        self.settings
            .as_ref()
            .map(|table| serde_json::to_value(table).context("converting [settings] table"))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_config_uses_defaults() {
        let config = CliConfig::parse("").unwrap();
        assert_eq!(config.state_file(), PathBuf::from(DEFAULT_STATE_FILE));
        assert_eq!(config.log_filter(), DEFAULT_LOG_FILTER);
        assert!(!config.json_logs);
        assert!(config.settings_value().unwrap().is_none());
    }

    #[test]
    fn settings_table_becomes_json() {
        let config = CliConfig::parse(
            r#"
            state_file = "state/opmode.json"
            json_logs = true

            [settings]
            maxConsecutiveFailures = 5
            showNotifications = false
            "#,
        )
        .unwrap();
        assert_eq!(config.state_file(), PathBuf::from("state/opmode.json"));
        assert!(config.json_logs);
        let value = config.settings_value().unwrap().unwrap();
        assert_eq!(value["maxConsecutiveFailures"], 5);
        assert_eq!(value["showNotifications"], false);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(CliConfig::parse("colour = \"blue\"").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(err.to_string().contains("reading config"));
    }
}
