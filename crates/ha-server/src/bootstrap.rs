//! Building a running instance from a config directory

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ha_components::seventeen_track::config_flow::{self, ImportConfig};
use ha_components::seventeen_track::{ClientFactory, SeventeenTrack, DOMAIN};
use ha_config::{integration_section, load_yaml, CoreConfig};
use ha_helpers::HomeAssistant;
use tracing::{info, warn};

/// Everything `configuration.yaml` asks for
#[derive(Debug)]
pub struct Configuration {
    pub core: CoreConfig,
    pub accounts: Vec<ImportConfig>,
}

impl Configuration {
    pub fn load(config_dir: &Path) -> Result<Self> {
        let yaml = load_yaml(config_dir, "configuration.yaml")
            .with_context(|| format!("loading configuration from {}", config_dir.display()))?;
        let core = CoreConfig::from_yaml(&yaml)?;
        let accounts = integration_section(&yaml, DOMAIN)?;
        Ok(Self { core, accounts })
    }
}

/// Create the instance and import configured accounts as config entries.
///
/// Nothing is set up yet; login problems surface when the entries are set
/// up. Accounts whose section is invalid or repeats a token are logged and
/// skipped.
pub fn bootstrap(config: Configuration, factory: Arc<dyn ClientFactory>) -> Result<HomeAssistant> {
    let hass = HomeAssistant::new(config.core)?;
    SeventeenTrack::register(&hass, factory);

    for account in config.accounts {
        let name = account.name.clone();
        match config_flow::import_entry(&hass, account) {
            Ok(entry) => info!("Imported 17Track account '{}' as {}", name, entry.entry_id),
            Err(e) => warn!("Could not import 17Track account '{}': {}", name, e),
        }
    }
    Ok(hass)
}
