//! Configuration file support for Ironplan.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/ironplan/config.toml`.

use crate::rounding::{Rounding, RoundingDirection};
use crate::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub rounding: RoundingConfig,

    #[serde(default)]
    pub progression: ProgressionConfig,

    #[serde(default)]
    pub meet: MeetConfig,
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

/// Plate rounding configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoundingConfig {
    #[serde(default = "default_increment")]
    pub increment: f64,

    #[serde(default)]
    pub direction: RoundingDirection,
}

impl Default for RoundingConfig {
    fn default() -> Self {
        Self {
            increment: default_increment(),
            direction: RoundingDirection::default(),
        }
    }
}

impl RoundingConfig {
    pub fn rounding(&self) -> Rounding {
        Rounding::new(self.increment, self.direction)
    }
}

/// Progression parameters configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressionConfig {
    #[serde(default = "default_failure_threshold")]
    pub default_failure_threshold: u32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            default_failure_threshold: default_failure_threshold(),
        }
    }
}

/// Meet configuration for taper-scheduled programs
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct MeetConfig {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("ironplan")
}

fn default_increment() -> f64 {
    5.0
}

fn default_failure_threshold() -> u32 {
    3
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
        if config.rounding.increment <= 0.0 {
            return Err(Error::Config(format!(
                "rounding increment must be positive, got {}",
                config.rounding.increment
            )));
        }
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("ironplan").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
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
        assert_eq!(config.rounding.increment, 5.0);
        assert_eq!(config.rounding.direction, RoundingDirection::Nearest);
        assert_eq!(config.progression.default_failure_threshold, 3);
        assert!(config.meet.date.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.rounding.increment, parsed.rounding.increment);
        assert_eq!(
            config.progression.default_failure_threshold,
            parsed.progression.default_failure_threshold
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[rounding]
increment = 2.5
direction = "down"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.rounding.increment, 2.5);
        assert_eq!(config.rounding.direction, RoundingDirection::Down);
        assert_eq!(config.progression.default_failure_threshold, 3); // default
    }

    #[test]
    fn test_meet_date_parses() {
        let toml_str = r#"
[meet]
date = "2026-11-07"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.meet.date,
            Some(NaiveDate::from_ymd_opt(2026, 11, 7).unwrap())
        );
    }

    #[test]
    fn test_bad_increment_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[rounding]\nincrement = 0.0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
