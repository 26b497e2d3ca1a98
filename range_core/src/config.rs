//! Configuration file support for rangelog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/rangelog/config.toml`.

use crate::caliber::{CaliberMatcher, PermissiveCalibers, StrictCalibers};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,

    #[serde(default)]
    pub calibers: CaliberConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Thresholds for the green/yellow/red maintenance status
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaintenanceConfig {
    #[serde(default = "default_rounds_warn")]
    pub rounds_warn: i64,

    #[serde(default = "default_rounds_alert")]
    pub rounds_alert: i64,

    #[serde(default = "default_days_warn")]
    pub days_warn: i64,

    #[serde(default = "default_days_alert")]
    pub days_alert: i64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            rounds_warn: default_rounds_warn(),
            rounds_alert: default_rounds_alert(),
            days_warn: default_days_warn(),
            days_alert: default_days_alert(),
        }
    }
}

/// How a missing caliber designation is treated
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaliberPolicy {
    /// Missing caliber is incompatible
    #[default]
    Strict,
    /// Missing caliber is compatible (legacy behavior)
    Permissive,
}

/// Caliber matching configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CaliberConfig {
    #[serde(default)]
    pub policy: CaliberPolicy,
}

impl CaliberConfig {
    /// The matcher implementing the configured policy
    pub fn matcher(&self) -> &'static dyn CaliberMatcher {
        match self.policy {
            CaliberPolicy::Strict => &StrictCalibers,
            CaliberPolicy::Permissive => &PermissiveCalibers,
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("rangelog")
}

fn default_rounds_warn() -> i64 {
    300
}

fn default_rounds_alert() -> i64 {
    500
}

fn default_days_warn() -> i64 {
    30
}

fn default_days_alert() -> i64 {
    60
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("rangelog").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.maintenance.rounds_warn, 300);
        assert_eq!(config.maintenance.rounds_alert, 500);
        assert_eq!(config.maintenance.days_warn, 30);
        assert_eq!(config.maintenance.days_alert, 60);
        assert_eq!(config.calibers.policy, CaliberPolicy::Strict);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.maintenance.rounds_warn, parsed.maintenance.rounds_warn);
        assert_eq!(config.calibers.policy, parsed.calibers.policy);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[maintenance]
rounds_warn = 250

[calibers]
policy = "permissive"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.maintenance.rounds_warn, 250);
        assert_eq!(config.maintenance.rounds_alert, 500); // default
        assert_eq!(config.calibers.policy, CaliberPolicy::Permissive);
    }

    #[test]
    fn test_policy_selects_matcher() {
        let strict = CaliberConfig {
            policy: CaliberPolicy::Strict,
        };
        let permissive = CaliberConfig {
            policy: CaliberPolicy::Permissive,
        };
        assert!(!strict.matcher().compatible(None, Some("9mm")));
        assert!(permissive.matcher().compatible(None, Some("9mm")));
    }
}
