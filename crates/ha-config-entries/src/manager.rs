//! Config Entries Manager
//!
//! Owns every config entry and drives its lifecycle through the registered
//! [`Integration`]s. Setup results are mapped onto entry states; entries that
//! are not ready yet get a setup retry scheduled with exponential backoff.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use ha_core::HomeAssistantError;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::integration::Integration;
use crate::state_machine::{calculate_retry_delay, InvalidTransition};

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("No integration registered for domain {0}")]
    NoIntegration(String),

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config Entries Manager
///
/// Entries are kept in memory only. Setup and unload of a single entry are
/// serialized by the entry's own lock; different entries proceed in parallel.
#[derive(Default)]
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Integrations by domain
    integrations: DashMap<String, Arc<dyn Integration>>,

    /// Pending setup retries by entry_id
    retries: DashMap<String, JoinHandle<()>>,
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the integration that sets up entries of its domain
    pub fn register_integration(&self, integration: Arc<dyn Integration>) {
        let domain = integration.domain().to_string();
        debug!("Registered integration for domain: {}", domain);
        self.integrations.insert(domain, integration);
    }

    fn integration(&self, domain: &str) -> ConfigEntriesResult<Arc<dyn Integration>> {
        self.integrations
            .get(domain)
            .map(|i| i.value().clone())
            .ok_or_else(|| ConfigEntriesError::NoIntegration(domain.to_string()))
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();
        self.entries.insert(entry_id.clone(), entry.clone());
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }
        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    fn require(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        self.get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get loaded entries for a domain
    pub fn get_loaded_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.get_by_domain(domain)
            .into_iter()
            .filter(|e| e.is_loaded())
            .collect()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        self.by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .and_then(|entry_id| self.get(&entry_id))
    }

    /// All entry ids, in no particular order
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a new config entry (does not set it up)
    #[instrument(skip(self, entry), fields(domain = %entry.domain))]
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );
        Ok(entry)
    }

    /// Update an existing entry.
    ///
    /// When the options of a loaded entry change, the integration's
    /// `options_updated` hook runs before this returns. A failing hook is
    /// logged; the update itself stays applied.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut updated = self.require(entry_id)?;
        if let Some(Some(ref unique_id)) = update.unique_id {
            if let Some(other) = self.get_by_unique_id(&updated.domain, unique_id) {
                if other.entry_id != entry_id {
                    return Err(ConfigEntriesError::AlreadyExists {
                        domain: updated.domain.clone(),
                        unique_id: unique_id.clone(),
                    });
                }
            }
        }

        self.unindex_entry(&updated);

        let old_options = std::mem::take(&mut updated.options);
        updated.options = update.options.unwrap_or_else(|| old_options.clone());
        if let Some(title) = update.title {
            updated.title = title;
        }
        if let Some(data) = update.data {
            updated.data = data;
        }
        if let Some(unique_id) = update.unique_id {
            updated.unique_id = unique_id;
        }
        if let Some(pref) = update.pref_disable_polling {
            updated.pref_disable_polling = pref;
        }
        updated.modified_at = Utc::now();

        self.index_entry(&updated);
        debug!("Updated config entry: {}", entry_id);

        if updated.is_loaded() && updated.options != old_options {
            let integration = self.integration(&updated.domain)?;
            if let Err(e) = integration.options_updated(&updated).await {
                error!("Error applying new options to {}: {}", entry_id, e);
            }
        }

        Ok(updated)
    }

    /// Merge new options into an entry, keeping keys that are not given
    pub async fn update_options(
        &self,
        entry_id: &str,
        options: HashMap<String, serde_json::Value>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut merged = self.require(entry_id)?.options;
        merged.extend(options);
        self.update(entry_id, ConfigEntryUpdate::new().options(merged))
            .await
    }

    /// Unload (if needed) and remove an entry
    #[instrument(skip(self))]
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self.require(entry_id)?;
        if entry.state.is_recoverable() && entry.state != ConfigEntryState::NotLoaded {
            self.unload(entry_id).await?;
        }
        self.cancel_retry(entry_id);

        let entry = self.require(entry_id)?;
        self.unindex_entry(&entry);
        if let Ok(integration) = self.integration(&entry.domain) {
            integration.remove_entry(&entry).await;
        }
        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<u32> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        if state == ConfigEntryState::SetupRetry {
            entry.increment_tries();
        }
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(entry.tries)
    }

    /// Set up an entry by calling its integration's `setup_entry`.
    ///
    /// Returns `Ok(true)` once the entry is `Loaded` and `Ok(false)` when the
    /// integration failed; the entry's state and reason tell why.
    #[instrument(skip(self))]
    pub async fn setup(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<bool> {
        let lock = self.require(entry_id)?.setup_lock;
        let _guard = lock.lock().await;

        // re-read under the lock; an unload may have won the race
        let entry = self.require(entry_id)?;
        if entry.is_disabled() {
            debug!("Skipping setup for disabled entry: {}", entry_id);
            return Ok(false);
        }
        if entry.is_loaded() {
            return Ok(true);
        }
        let integration = self.integration(&entry.domain)?;

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;
        self.retries.remove(entry_id);
        let entry = self.require(entry_id)?;

        match integration.setup_entry(&entry).await {
            Ok(()) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(true)
            }
            Err(err) if err.is_retryable() => {
                let tries = self.transition(
                    entry_id,
                    ConfigEntryState::SetupRetry,
                    Some(err.to_string()),
                )?;
                let delay = calculate_retry_delay(tries - 1);
                warn!(
                    "Config entry '{}' for {} integration not ready yet: {}; retrying in {:.1}s",
                    entry.title,
                    entry.domain,
                    err,
                    delay.as_secs_f64()
                );
                self.schedule_retry(entry_id.to_string(), delay);
                Ok(false)
            }
            Err(err) => {
                match &err {
                    HomeAssistantError::ConfigEntryAuthFailed(_) => error!(
                        "Config entry '{}' for {} integration could not authenticate: {}",
                        entry.title, entry.domain, err
                    ),
                    _ => error!(
                        "Error setting up entry {} for {}: {}",
                        entry.title, entry.domain, err
                    ),
                }
                self.transition(entry_id, ConfigEntryState::SetupError, Some(err.to_string()))?;
                Ok(false)
            }
        }
    }

    fn setup_owned(self: Arc<Self>, entry_id: String) -> BoxFuture<'static, ConfigEntriesResult<bool>> {
        Box::pin(async move { self.setup(&entry_id).await })
    }

    fn schedule_retry(self: &Arc<Self>, entry_id: String, delay: std::time::Duration) {
        let manager = Arc::clone(self);
        let key = entry_id.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = manager.setup_owned(entry_id.clone()).await {
                warn!("Setup retry for {} failed: {}", entry_id, e);
            }
        });
        if let Some(previous) = self.retries.insert(key, handle) {
            previous.abort();
        }
    }

    fn cancel_retry(&self, entry_id: &str) {
        if let Some((_, handle)) = self.retries.remove(entry_id) {
            handle.abort();
        }
    }

    /// Whether a setup retry is pending for the entry
    pub fn retry_pending(&self, entry_id: &str) -> bool {
        self.retries.contains_key(entry_id)
    }

    /// Unload an entry by calling its integration's `unload_entry`.
    ///
    /// Entries that never finished setup go straight back to `NotLoaded`
    /// without involving the integration.
    #[instrument(skip(self))]
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<bool> {
        let lock = self.require(entry_id)?.setup_lock;
        let _guard = lock.lock().await;

        let entry = self.require(entry_id)?;
        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(true),
            state if !state.is_recoverable() => {
                return Err(ConfigEntriesError::CannotUnload(state));
            }
            _ => {}
        }

        self.cancel_retry(entry_id);
        let was_loaded = entry.is_loaded();
        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        if !was_loaded {
            self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
            return Ok(true);
        }

        let integration = self.integration(&entry.domain)?;
        match integration.unload_entry(&entry).await {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(true)
            }
            Ok(false) => {
                warn!("Integration refused to unload entry {}", entry_id);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some("unload refused by integration".to_string()),
                )?;
                Ok(false)
            }
            Err(e) => {
                error!("Error unloading entry {}: {}", entry_id, e);
                self.transition(entry_id, ConfigEntryState::FailedUnload, Some(e.to_string()))?;
                Ok(false)
            }
        }
    }

    /// Unload then set up an entry again
    pub async fn reload(self: &Arc<Self>, entry_id: &str) -> ConfigEntriesResult<bool> {
        if !self.unload(entry_id).await? {
            return Ok(false);
        }
        self.setup(entry_id).await
    }

    /// Set up every entry that is not loaded yet, concurrently
    pub async fn setup_all(self: &Arc<Self>) {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.state == ConfigEntryState::NotLoaded)
            .map(|e| e.key().clone())
            .collect();

        let results = join_all(ids.iter().map(|id| self.setup(id))).await;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                error!("Could not set up entry {}: {}", id, e);
            }
        }
    }

    /// Unload every entry, concurrently
    pub async fn unload_all(&self) {
        let ids = self.entry_ids();
        let results = join_all(ids.iter().map(|id| self.unload(id))).await;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                error!("Could not unload entry {}: {}", id, e);
            }
        }
    }
}
