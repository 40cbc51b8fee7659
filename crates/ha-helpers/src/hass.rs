//! Handle to a running instance
//!
//! Bundles the core configuration with the shared registries. Integrations
//! receive the pieces they need out of this at construction time and keep
//! their own `Arc`s; the hub itself is owned by the binary.

use std::sync::Arc;

use chrono_tz::Tz;
use ha_config::{ConfigResult, CoreConfig};
use ha_config_entries::ConfigEntries;
use ha_registries::DeviceRegistry;
use ha_service_registry::ServiceRegistry;
use ha_state_store::StateStore;

pub struct HomeAssistant {
    pub config: CoreConfig,
    pub states: Arc<StateStore>,
    pub services: Arc<ServiceRegistry>,
    pub devices: Arc<DeviceRegistry>,
    pub config_entries: Arc<ConfigEntries>,
    time_zone: Tz,
}

impl HomeAssistant {
    /// Create an instance with empty registries
    ///
    /// Fails if the configured time zone is unknown.
    pub fn new(config: CoreConfig) -> ConfigResult<Self> {
        let time_zone = config.tz()?;
        Ok(Self {
            config,
            states: Arc::new(StateStore::new()),
            services: Arc::new(ServiceRegistry::new()),
            devices: Arc::new(DeviceRegistry::new()),
            config_entries: Arc::new(ConfigEntries::new()),
            time_zone,
        })
    }

    /// Time zone timestamps are shown in
    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_resolves_time_zone() {
        let config = CoreConfig {
            time_zone: "Europe/Berlin".to_string(),
            ..CoreConfig::default()
        };
        let hass = HomeAssistant::new(config).unwrap();
        assert_eq!(hass.time_zone(), chrono_tz::Europe::Berlin);
        assert!(hass.config_entries.is_empty());
        assert_eq!(hass.states.entity_count(), 0);
    }

    #[test]
    fn test_new_rejects_unknown_time_zone() {
        let config = CoreConfig {
            time_zone: "Mars/Olympus_Mons".to_string(),
            ..CoreConfig::default()
        };
        assert!(HomeAssistant::new(config).is_err());
    }
}
