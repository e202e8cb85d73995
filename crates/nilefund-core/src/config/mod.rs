//! Configuration management with file persistence

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::ledger::LedgerConfig;
use crate::domain::locking::LockConfig;

/// Nilefund configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub ledger: LedgerSettings,
    pub locking: LockingSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file; `None` means `<data dir>/nilefund/nilefund.db`
    pub database_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub allow_overfunding: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockingSettings {
    pub timeout_ms: u64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            allow_overfunding: true,
        }
    }
}

impl Default for LockingSettings {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("NILEFUND_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("nilefund")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.locking.timeout_ms == 0 {
            return Err(anyhow!("locking.timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Resolved database path
    ///
    /// `NILEFUND_DATABASE` wins over the configured path, which wins over the
    /// platform data directory.
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        if let Ok(path) = env::var("NILEFUND_DATABASE") {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.storage.database_path {
            return Ok(path.clone());
        }
        Ok(dirs::data_dir()
            .ok_or_else(|| anyhow!("Could not determine data directory"))?
            .join("nilefund")
            .join("nilefund.db"))
    }

    pub fn lock_config(&self) -> LockConfig {
        LockConfig::default().with_timeout(Duration::from_millis(self.locking.timeout_ms))
    }

    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            allow_overfunding: self.ledger.allow_overfunding,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.storage.database_path.is_none());
        assert!(config.ledger.allow_overfunding);
        assert_eq!(config.locking.timeout_ms, 5000);
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_config().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [ledger]
            allow_overfunding = false
            "#,
        )
        .unwrap();

        assert!(!config.ledger_config().allow_overfunding);
        assert_eq!(config.locking.timeout_ms, 5000);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let error = Config::from_toml("[locking]\ntimeout_ms = 0\n").unwrap_err();
        assert!(error.to_string().contains("timeout_ms"));
    }

    #[test]
    fn test_configured_database_path() {
        let config = Config::from_toml("[storage]\ndatabase_path = \"/var/lib/nilefund/state.db\"\n").unwrap();
        assert_eq!(
            config.storage.database_path,
            Some(PathBuf::from("/var/lib/nilefund/state.db"))
        );
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = Config::default();
        config.locking.timeout_ms = 250;
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
