//! Creating, importing and re-authenticating 17Track entries
//!
//! There is no interactive UI; these functions carry the validation the
//! flows perform. Errors map onto the usual flow error keys
//! (`invalid_auth`, `cannot_connect`, `already_configured`).

use std::collections::HashMap;

use ha_config_entries::{ConfigEntriesError, ConfigEntry, ConfigEntrySource, ConfigEntryUpdate};
use ha_core::consts::{CONF_NAME, CONF_SCAN_INTERVAL, CONF_TOKEN};
use ha_helpers::HomeAssistant;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use super::api::ClientFactory;
use super::consts::{CONF_SHOW_ARCHIVED, DEFAULT_NAME, DOMAIN};
use super::coordinator::EntryOptions;
use super::errors::ClientError;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("invalid_auth")]
    InvalidAuth,

    #[error("cannot_connect")]
    CannotConnect,

    #[error("already_configured")]
    AlreadyConfigured,

    #[error("invalid_scan_interval")]
    InvalidScanInterval,

    #[error(transparent)]
    Entries(ConfigEntriesError),
}

impl From<ConfigEntriesError> for FlowError {
    fn from(err: ConfigEntriesError) -> Self {
        match err {
            ConfigEntriesError::AlreadyExists { .. } => FlowError::AlreadyConfigured,
            other => FlowError::Entries(other),
        }
    }
}

/// Account fields asked for when adding an entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserInput {
    #[serde(default = "default_name")]
    pub name: String,
    pub token: String,
}

/// One item of the `seventeen_track:` section of `configuration.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImportConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub scan_interval: Option<u64>,
    #[serde(default)]
    pub show_archived: Option<bool>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// Log in with `token` and return the account id
pub async fn validate_input(factory: &dyn ClientFactory, token: &str) -> Result<String, FlowError> {
    match factory.login(token).await {
        Ok(client) => Ok(client.account_id().to_string()),
        Err(ClientError::Authentication | ClientError::MissingToken) => Err(FlowError::InvalidAuth),
        Err(ClientError::Api(err)) => {
            warn!("Could not reach 17Track: {}", err);
            Err(FlowError::CannotConnect)
        }
    }
}

fn entry_data(name: &str, token: &str) -> HashMap<String, Value> {
    HashMap::from([
        (CONF_NAME.to_string(), Value::from(name)),
        (CONF_TOKEN.to_string(), Value::from(token)),
    ])
}

/// Add an entry for a new account. The entry is not set up.
pub async fn create_entry(
    hass: &HomeAssistant,
    factory: &dyn ClientFactory,
    input: UserInput,
) -> Result<ConfigEntry, FlowError> {
    let account_id = validate_input(factory, &input.token).await?;
    if hass
        .config_entries
        .get_by_unique_id(DOMAIN, &account_id)
        .is_some()
    {
        return Err(FlowError::AlreadyConfigured);
    }

    let entry = ConfigEntry::new(DOMAIN, input.name.as_str())
        .with_data(entry_data(&input.name, &input.token))
        .with_unique_id(account_id)
        .with_source(ConfigEntrySource::User);
    Ok(hass.config_entries.add(entry)?)
}

/// Add an entry from `configuration.yaml`. The entry is not set up.
///
/// No login happens here: an unreachable API or a rejected token shows up
/// when the entry is set up, as a setup retry or a setup error. Imports are
/// matched by token until the first setup stores the account id as the
/// entry's unique id.
pub fn import_entry(hass: &HomeAssistant, config: ImportConfig) -> Result<ConfigEntry, FlowError> {
    let already_imported = hass
        .config_entries
        .get_by_domain(DOMAIN)
        .iter()
        .any(|entry| entry.data_str(CONF_TOKEN) == Some(config.token.as_str()));
    if already_imported {
        return Err(FlowError::AlreadyConfigured);
    }

    let mut options = HashMap::new();
    if let Some(scan_interval) = config.scan_interval {
        if scan_interval == 0 {
            return Err(FlowError::InvalidScanInterval);
        }
        options.insert(CONF_SCAN_INTERVAL.to_string(), Value::from(scan_interval));
    }
    if let Some(show_archived) = config.show_archived {
        options.insert(CONF_SHOW_ARCHIVED.to_string(), Value::from(show_archived));
    }

    let entry = ConfigEntry::new(DOMAIN, config.name.as_str())
        .with_data(entry_data(&config.name, &config.token))
        .with_options(options)
        .with_source(ConfigEntrySource::Import);
    Ok(hass.config_entries.add(entry)?)
}

/// Replace the token of an existing entry and reload it
pub async fn reauth(
    hass: &HomeAssistant,
    factory: &dyn ClientFactory,
    entry_id: &str,
    token: &str,
) -> Result<(), FlowError> {
    let entry = hass
        .config_entries
        .get(entry_id)
        .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
    validate_input(factory, token).await?;

    let mut data = entry.data;
    data.insert(CONF_TOKEN.to_string(), Value::from(token));
    hass.config_entries
        .update(entry_id, ConfigEntryUpdate::new().data(data))
        .await?;
    hass.config_entries.reload(entry_id).await?;
    info!("Re-authenticated 17Track entry {}", entry_id);
    Ok(())
}

/// Options shown when editing an entry
pub fn current_options(entry: &ConfigEntry) -> EntryOptions {
    EntryOptions::from_entry(entry)
}

/// Store new options; a loaded entry picks them up right away
pub async fn apply_options(
    hass: &HomeAssistant,
    entry_id: &str,
    options: EntryOptions,
) -> Result<ConfigEntry, FlowError> {
    if options.scan_interval == 0 {
        return Err(FlowError::InvalidScanInterval);
    }
    let options = HashMap::from([
        (CONF_SCAN_INTERVAL.to_string(), Value::from(options.scan_interval)),
        (CONF_SHOW_ARCHIVED.to_string(), Value::from(options.show_archived)),
    ]);
    Ok(hass.config_entries.update_options(entry_id, options).await?)
}
