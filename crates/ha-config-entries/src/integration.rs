//! Integration entry points
//!
//! The manager drives an integration exclusively through this trait; the
//! error an entry point returns decides which state the entry lands in.

use async_trait::async_trait;
use ha_core::HomeAssistantError;

use crate::entry::ConfigEntry;

/// Entry points of an integration that can be set up from config entries.
///
/// | `setup_entry` result              | entry state  |
/// |-----------------------------------|--------------|
/// | `Ok(())`                          | `Loaded`     |
/// | `Err(ConfigEntryAuthFailed)`      | `SetupError` |
/// | `Err(ConfigEntryError)`/`Failed`  | `SetupError` |
/// | `Err(ConfigEntryNotReady)`        | `SetupRetry` |
#[async_trait]
pub trait Integration: Send + Sync {
    /// Domain this integration handles
    fn domain(&self) -> &str;

    /// Set up one config entry
    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), HomeAssistantError>;

    /// Tear down one config entry. `Ok(false)` means the integration refused.
    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<bool, HomeAssistantError>;

    /// Clean up after an entry was removed for good (it is already unloaded)
    async fn remove_entry(&self, _entry: &ConfigEntry) {}

    /// Called after the options of a loaded entry changed
    async fn options_updated(&self, _entry: &ConfigEntry) -> Result<(), HomeAssistantError> {
        Ok(())
    }
}
