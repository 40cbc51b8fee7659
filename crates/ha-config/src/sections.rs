//! Typed access to integration sections of configuration.yaml

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::error::{ConfigError, ConfigResult};

/// Deserialize every item configured under `domain:`
///
/// The section may be a single mapping or a list of mappings; a missing or
/// null section yields no items.
pub fn integration_section<T: DeserializeOwned>(yaml: &Value, domain: &str) -> ConfigResult<Vec<T>> {
    let items = match yaml.get(domain) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Sequence(items)) => items.clone(),
        Some(item) => vec![item.clone()],
    };

    items
        .into_iter()
        .map(|item| {
            serde_yaml::from_value(item).map_err(|e| ConfigError::InvalidValue {
                key: domain.to_string(),
                reason: e.to_string(),
            })
        })
        .collect()
}
