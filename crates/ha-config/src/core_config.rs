//! Core Home Assistant configuration
//!
//! Parses the `homeassistant:` section from configuration.yaml

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Core configuration from the `homeassistant:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Name of the location (e.g., "Home")
    #[serde(default = "default_name")]
    pub name: String,

    /// Time zone (e.g., "America/Los_Angeles")
    #[serde(default = "default_time_zone")]
    pub time_zone: String,

    /// Language code (e.g., "en")
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_name() -> String {
    "Home".to_string()
}

fn default_time_zone() -> String {
    "UTC".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            time_zone: default_time_zone(),
            language: default_language(),
        }
    }
}

impl CoreConfig {
    /// Load core configuration from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = load_yaml(config_dir.as_ref(), "configuration.yaml")?;
        Self::from_yaml(&yaml)
    }

    /// Parse core configuration from the root YAML value
    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        let mapping = yaml.as_mapping().ok_or_else(|| ConfigError::InvalidValue {
            key: "root".to_string(),
            reason: "configuration must be a mapping".to_string(),
        })?;

        let section = mapping
            .get("homeassistant")
            .cloned()
            .unwrap_or(Value::Mapping(serde_yaml::Mapping::new()));

        let config: CoreConfig =
            serde_yaml::from_value(section).map_err(|e| ConfigError::InvalidValue {
                key: "homeassistant".to_string(),
                reason: e.to_string(),
            })?;

        // Fail at load time rather than on the first timestamp conversion
        config.tz()?;
        Ok(config)
    }

    /// The configured time zone
    pub fn tz(&self) -> ConfigResult<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimeZone {
                name: self.time_zone.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.name, "Home");
        assert_eq!(config.tz().unwrap(), Tz::UTC);
    }

    #[test]
    fn test_parse_from_yaml() {
        let yaml: Value = serde_yaml::from_str(
            r#"
homeassistant:
  name: Test Home
  time_zone: America/New_York
"#,
        )
        .unwrap();

        let config = CoreConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.name, "Test Home");
        assert_eq!(config.tz().unwrap(), chrono_tz::America::New_York);
    }

    #[test]
    fn test_missing_section_uses_defaults() {
        let yaml: Value = serde_yaml::from_str("seventeen_track: []\n").unwrap();
        let config = CoreConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.time_zone, "UTC");
    }

    #[test]
    fn test_invalid_time_zone() {
        let yaml: Value = serde_yaml::from_str(
            r#"
homeassistant:
  time_zone: Mars/Olympus_Mons
"#,
        )
        .unwrap();

        let err = CoreConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTimeZone { name } if name == "Mars/Olympus_Mons"));
    }
}
