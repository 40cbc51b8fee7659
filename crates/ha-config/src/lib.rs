//! YAML configuration loading for Home Assistant
//!
//! Reads `configuration.yaml` from a config directory, resolving the
//! `!secret key` (from `secrets.yaml`) and `!env_var VAR` tags, and exposes
//! the core `homeassistant:` section plus typed access to integration
//! sections such as `seventeen_track:`.
//!
//! # Example
//!
//! ```ignore
//! use ha_config::{load_yaml, CoreConfig};
//!
//! let yaml = load_yaml("/config", "configuration.yaml")?;
//! let core = CoreConfig::from_yaml(&yaml)?;
//! let tz = core.tz()?;
//! ```

mod core_config;
mod error;
mod loader;
mod sections;

pub use core_config::CoreConfig;
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use sections::integration_section;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
