//! 17Track package tracking
//!
//! Each config entry is one 17track.net account. Setting up an entry logs
//! in, records the account id as the entry's unique id if it has none yet,
//! runs a first refresh, starts polling and publishes the package sensors.
//! The `add_package` service lives as long as at least one entry is loaded.

pub mod api;
pub mod config_flow;
pub mod consts;
pub mod coordinator;
pub mod errors;
pub mod sensor;
pub mod services;

#[cfg(test)]
mod test_util;

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono_tz::Tz;
use dashmap::DashMap;
use ha_config_entries::{
    ConfigEntries, ConfigEntriesError, ConfigEntry, ConfigEntryUpdate, Integration,
};
use ha_core::HomeAssistantError;
use ha_helpers::{EntityPlatform, HomeAssistant, PlatformHandle};
use ha_registries::DeviceRegistry;
use ha_service_registry::ServiceRegistry;
use tracing::{debug, info};

pub use api::{ClientFactory, HttpClientFactory, SeventeenTrackApi};
pub use consts::DOMAIN;
pub use coordinator::{EntryOptions, SeventeenTrackCoordinator, SeventeenTrackData};
pub use errors::ClientError;

use api::get_client;
use consts::{PLATFORM_SENSOR, SERVICE_ADD_PACKAGE};
use services::Coordinators;

/// The 17Track integration
pub struct SeventeenTrack {
    factory: Arc<dyn ClientFactory>,
    entries: Weak<ConfigEntries>,
    services: Arc<ServiceRegistry>,
    devices: Arc<DeviceRegistry>,
    sensors: EntityPlatform,
    time_zone: Tz,
    coordinators: Coordinators,
    platforms: DashMap<String, PlatformHandle>,
}

impl SeventeenTrack {
    pub fn new(hass: &HomeAssistant, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            entries: Arc::downgrade(&hass.config_entries),
            services: Arc::clone(&hass.services),
            devices: Arc::clone(&hass.devices),
            sensors: EntityPlatform::new(
                PLATFORM_SENSOR,
                Arc::clone(&hass.states),
                Arc::clone(&hass.devices),
            ),
            time_zone: hass.time_zone(),
            coordinators: Coordinators::default(),
            platforms: DashMap::new(),
        }
    }

    /// Create the integration and register it with the config entries manager
    pub fn register(hass: &HomeAssistant, factory: Arc<dyn ClientFactory>) -> Arc<Self> {
        let integration = Arc::new(Self::new(hass, factory));
        hass.config_entries
            .register_integration(Arc::clone(&integration) as Arc<dyn Integration>);
        integration
    }

    pub fn factory(&self) -> &dyn ClientFactory {
        self.factory.as_ref()
    }

    /// Store the account id as unique id of an entry that has none yet
    async fn adopt_account_id(
        &self,
        entry: &ConfigEntry,
        account_id: &str,
    ) -> Result<(), HomeAssistantError> {
        let Some(entries) = self.entries.upgrade() else {
            return Ok(());
        };
        let update = ConfigEntryUpdate::new().unique_id(Some(account_id.to_string()));
        match entries.update(&entry.entry_id, update).await {
            Ok(_) => {
                debug!("Entry {} belongs to account {}", entry.entry_id, account_id);
                Ok(())
            }
            Err(ConfigEntriesError::AlreadyExists { .. }) => Err(HomeAssistantError::ConfigEntryError(
                format!("17Track account {account_id} is already configured"),
            )),
            Err(err) => Err(HomeAssistantError::ConfigEntryError(err.to_string())),
        }
    }

    /// Coordinator of a loaded entry
    pub fn coordinator(&self, entry_id: &str) -> Option<Arc<SeventeenTrackCoordinator>> {
        self.coordinators
            .get(entry_id)
            .map(|c| Arc::clone(c.value()))
    }
}

#[async_trait]
impl Integration for SeventeenTrack {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), HomeAssistantError> {
        let client = get_client(self.factory.as_ref(), &entry.data)
            .await
            .map_err(|err| match err {
                ClientError::Authentication | ClientError::MissingToken => {
                    HomeAssistantError::ConfigEntryAuthFailed(err.to_string())
                }
                ClientError::Api(err) => HomeAssistantError::ConfigEntryNotReady(format!(
                    "There was an error while logging in: {err}"
                )),
            })?;
        if entry.unique_id.is_none() {
            self.adopt_account_id(entry, client.account_id()).await?;
        }

        let coordinator = coordinator::new_coordinator(entry, client, self.time_zone);
        coordinator.config_entry_first_refresh().await?;

        services::register(
            &self.services,
            Arc::clone(&self.devices),
            Arc::clone(&self.coordinators),
        )
        .map_err(|e| HomeAssistantError::ConfigEntryError(e.to_string()))?;

        coordinator.start();
        let platform = sensor::setup_entry(&self.sensors, entry, &coordinator);
        self.coordinators
            .insert(entry.entry_id.clone(), Arc::clone(&coordinator));
        if let Some(previous) = self.platforms.insert(entry.entry_id.clone(), platform) {
            previous.remove();
        }

        info!(
            "17Track account {} set up for entry {}",
            coordinator.updater().account_id(),
            entry.entry_id
        );
        Ok(())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<bool, HomeAssistantError> {
        if let Some((_, platform)) = self.platforms.remove(&entry.entry_id) {
            platform.remove();
        }
        if let Some((_, coordinator)) = self.coordinators.remove(&entry.entry_id) {
            coordinator.shutdown();
        }

        if self.coordinators.is_empty() {
            debug!("Last 17Track entry unloaded, removing services");
            self.services.unregister(DOMAIN, SERVICE_ADD_PACKAGE);
        }
        Ok(true)
    }

    async fn remove_entry(&self, entry: &ConfigEntry) {
        let removed = self.devices.clear_config_entry(&entry.entry_id);
        debug!("Removed {} devices of entry {}", removed, entry.entry_id);
    }

    async fn options_updated(&self, entry: &ConfigEntry) -> Result<(), HomeAssistantError> {
        let Some(coordinator) = self.coordinator(&entry.entry_id) else {
            return Ok(());
        };

        let options = EntryOptions::from_entry(entry);
        debug!(
            "Applying options to {}: every {} min, archived {}",
            entry.entry_id, options.scan_interval, options.show_archived
        );
        coordinator.updater().set_show_archived(options.show_archived);
        coordinator.set_update_interval(options.update_interval());
        coordinator.request_refresh().await;
        Ok(())
    }
}
