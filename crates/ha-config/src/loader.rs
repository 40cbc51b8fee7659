//! YAML configuration loader with `!secret` and `!env_var` support

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const SECRETS_FILE: &str = "secrets.yaml";

/// YAML loader resolving Home Assistant's substitution tags
pub struct YamlLoader {
    /// Base directory for resolving relative paths
    config_dir: PathBuf,
    /// Contents of secrets.yaml, read on first `!secret`
    secrets: Option<Mapping>,
}

impl YamlLoader {
    /// Create a new YAML loader for the given config directory
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets: None,
        }
    }

    /// Load and process a YAML file relative to the config directory
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.config_dir.join(path);
        debug!("Loading YAML file: {:?}", path);

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.load_string(&content, &path)
    }

    /// Load and process YAML from a string
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process_value(value)
    }

    fn process_value(&mut self, value: Value) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => {
                let tag = tagged.tag.to_string();
                trace!("Processing tag '{}'", tag);
                match tag.as_str() {
                    "!secret" => self.resolve_secret(&tagged.value),
                    "!env_var" => resolve_env_var(&tagged.value),
                    _ => Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                        tag: tagged.tag,
                        value: self.process_value(tagged.value)?,
                    }))),
                }
            }
            Value::Mapping(map) => {
                let mut result = Mapping::new();
                for (k, v) in map {
                    result.insert(k, self.process_value(v)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process_value(v))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            _ => Ok(value),
        }
    }

    fn resolve_secret(&mut self, value: &Value) -> ConfigResult<Value> {
        let key = tag_argument(value, "!secret")?;

        if self.secrets.is_none() {
            let path = self.config_dir.join(SECRETS_FILE);
            if !path.exists() {
                return Err(ConfigError::SecretsFileNotFound { path });
            }
            let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
                path: path.clone(),
                source: e,
            })?;
            let secrets: Mapping =
                serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                    path: path.clone(),
                    source: e,
                })?;
            self.secrets = Some(secrets);
        }

        self.secrets
            .as_ref()
            .and_then(|secrets| secrets.get(key))
            .cloned()
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }
}

fn resolve_env_var(value: &Value) -> ConfigResult<Value> {
    let var = tag_argument(value, "!env_var")?;
    std::env::var(var)
        .map(Value::String)
        .map_err(|_| ConfigError::EnvVarNotFound {
            var: var.to_string(),
        })
}

fn tag_argument<'a>(value: &'a Value, tag: &str) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: tag.to_string(),
        reason: "tag argument must be a string".to_string(),
    })
}

/// Load a YAML file from a config directory
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir).load_file(file)
}
