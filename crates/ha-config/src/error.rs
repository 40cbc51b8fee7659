//! Errors raised while reading `configuration.yaml`

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A `!secret` tag names a key missing from `secrets.yaml`
    #[error("secret '{key}' not found in secrets.yaml")]
    SecretNotFound { key: String },

    /// A `!secret` tag was used without a `secrets.yaml` next to the config
    #[error("secrets.yaml not found at {path}")]
    SecretsFileNotFound { path: PathBuf },

    /// An `!env_var` tag names an unset variable
    #[error("environment variable '{var}' not set")]
    EnvVarNotFound { var: String },

    /// `homeassistant.time_zone` is not an IANA time zone name
    #[error("unknown time zone '{name}'")]
    UnknownTimeZone { name: String },

    /// A section or value has the wrong shape
    #[error("invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
