//! Device Registry
//!
//! Tracks registered devices with their identifiers and owning config
//! entries, indexed for lookups by id, identifier and config entry.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Device entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceEntryType {
    /// Service device (virtual, e.g. a cloud account)
    Service,
}

/// A device identifier (domain, id) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier(pub String, pub String);

impl DeviceIdentifier {
    pub fn new(domain: impl Into<String>, id: impl Into<String>) -> Self {
        Self(domain.into(), id.into())
    }

    pub fn domain(&self) -> &str {
        &self.0
    }

    pub fn id(&self) -> &str {
        &self.1
    }

    /// Create a key for indexing
    pub fn key(&self) -> String {
        format!("{}:{}", self.0, self.1)
    }
}

/// Device description provided by an entity
///
/// Entities that share identifiers end up attached to the same device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub identifiers: Vec<DeviceIdentifier>,
    /// Name used when the device is first created
    pub default_name: Option<String>,
    pub manufacturer: Option<String>,
    pub entry_type: Option<DeviceEntryType>,
}

/// A registered device entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceEntry {
    /// Internal UUID
    pub id: String,

    /// Unique identifiers by domain (e.g., [["seventeen_track", "account-1"]])
    pub identifiers: Vec<DeviceIdentifier>,

    /// Config entries this device belongs to
    pub config_entries: Vec<String>,

    /// Primary config entry ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_config_entry: Option<String>,

    /// Device name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// User-set name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_by_user: Option<String>,

    /// Manufacturer name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    /// Entry type (service, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<DeviceEntryType>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modified timestamp
    pub modified_at: DateTime<Utc>,
}

impl DeviceEntry {
    fn from_info(config_entry_id: &str, info: &DeviceInfo) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            identifiers: info.identifiers.clone(),
            config_entries: vec![config_entry_id.to_string()],
            primary_config_entry: Some(config_entry_id.to_string()),
            name: info.default_name.clone(),
            name_by_user: None,
            manufacturer: info.manufacturer.clone(),
            entry_type: info.entry_type,
            created_at: now,
            modified_at: now,
        }
    }

    /// Get display name (user name or device name)
    pub fn display_name(&self) -> &str {
        self.name_by_user
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("")
    }
}

/// Device Registry with multi-index support
///
/// Entries are stored as `Arc<DeviceEntry>` to avoid cloning on reads.
#[derive(Default)]
pub struct DeviceRegistry {
    /// Primary index: device_id -> DeviceEntry
    by_id: DashMap<String, Arc<DeviceEntry>>,

    /// Index: identifier key -> device_id
    by_identifier: DashMap<String, String>,

    /// Index: config_entry_id -> set of device_ids
    by_config_entry_id: DashMap<String, HashSet<String>>,
}

impl DeviceRegistry {
    /// Create a new, empty device registry
    pub fn new() -> Self {
        Self::default()
    }

    fn index_entry(&self, entry: Arc<DeviceEntry>) {
        let device_id = entry.id.clone();

        for identifier in &entry.identifiers {
            self.by_identifier.insert(identifier.key(), device_id.clone());
        }

        for config_entry_id in &entry.config_entries {
            self.by_config_entry_id
                .entry(config_entry_id.clone())
                .or_default()
                .insert(device_id.clone());
        }

        self.by_id.insert(device_id, entry);
    }

    fn unindex_entry(&self, entry: &DeviceEntry) {
        for identifier in &entry.identifiers {
            self.by_identifier.remove(&identifier.key());
        }

        for config_entry_id in &entry.config_entries {
            if let Some(mut ids) = self.by_config_entry_id.get_mut(config_entry_id) {
                ids.remove(&entry.id);
            }
        }

        self.by_id.remove(&entry.id);
    }

    /// Get device by ID
    pub fn get(&self, device_id: &str) -> Option<Arc<DeviceEntry>> {
        self.by_id.get(device_id).map(|r| Arc::clone(r.value()))
    }

    /// Get device by identifier
    pub fn get_by_identifier(&self, domain: &str, id: &str) -> Option<Arc<DeviceEntry>> {
        let key = DeviceIdentifier::new(domain, id).key();
        self.by_identifier
            .get(&key)
            .and_then(|device_id| self.get(&device_id))
    }

    /// Get all devices for a config entry
    pub fn get_by_config_entry_id(&self, config_entry_id: &str) -> Vec<Arc<DeviceEntry>> {
        self.by_config_entry_id
            .get(config_entry_id)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Get or create the device described by `info` for a config entry
    ///
    /// An existing device matched by any identifier gains the config entry
    /// (if it did not have it yet); otherwise a new device is created.
    pub fn get_or_create(&self, config_entry_id: &str, info: &DeviceInfo) -> Arc<DeviceEntry> {
        let existing = info
            .identifiers
            .iter()
            .find_map(|ident| self.get_by_identifier(ident.domain(), ident.id()));

        if let Some(existing) = existing {
            if existing.config_entries.iter().any(|id| id == config_entry_id) {
                return existing;
            }

            debug!(
                device_id = %existing.id,
                config_entry_id = %config_entry_id,
                "Adding config entry to existing device"
            );
            let mut updated = (*existing).clone();
            updated.config_entries.push(config_entry_id.to_string());
            updated.modified_at = Utc::now();
            let updated = Arc::new(updated);
            self.unindex_entry(&existing);
            self.index_entry(Arc::clone(&updated));
            return updated;
        }

        let entry = Arc::new(DeviceEntry::from_info(config_entry_id, info));
        info!(
            device_id = %entry.id,
            name = %entry.display_name(),
            "Registered device"
        );
        self.index_entry(Arc::clone(&entry));
        entry
    }

    /// Detach a config entry from all of its devices
    ///
    /// Devices left without any config entry are removed. Returns the number
    /// of removed devices.
    pub fn clear_config_entry(&self, config_entry_id: &str) -> usize {
        let mut removed = 0;

        for device in self.get_by_config_entry_id(config_entry_id) {
            self.unindex_entry(&device);

            let mut updated = (*device).clone();
            updated.config_entries.retain(|id| id != config_entry_id);
            if updated.primary_config_entry.as_deref() == Some(config_entry_id) {
                updated.primary_config_entry = updated.config_entries.first().cloned();
            }

            if updated.config_entries.is_empty() {
                debug!(device_id = %updated.id, "Removed device without config entries");
                removed += 1;
            } else {
                updated.modified_at = Utc::now();
                self.index_entry(Arc::new(updated));
            }
        }

        self.by_config_entry_id.remove(config_entry_id);
        removed
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_info(account: &str) -> DeviceInfo {
        DeviceInfo {
            identifiers: vec![DeviceIdentifier::new("seventeen_track", account)],
            default_name: Some("17Track".to_string()),
            manufacturer: Some("17Track".to_string()),
            entry_type: Some(DeviceEntryType::Service),
        }
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = DeviceRegistry::new();

        let first = registry.get_or_create("entry-1", &account_info("acc-1"));
        let second = registry.get_or_create("entry-1", &account_info("acc-1"));

        assert_eq!(first.id, second.id);
        assert_eq!(registry.len(), 1);
        assert_eq!(first.display_name(), "17Track");
        assert_eq!(first.entry_type, Some(DeviceEntryType::Service));
    }

    #[test]
    fn test_lookup_indexes() {
        let registry = DeviceRegistry::new();
        let device = registry.get_or_create("entry-1", &account_info("acc-1"));

        assert_eq!(registry.get(&device.id).unwrap().id, device.id);
        assert_eq!(
            registry
                .get_by_identifier("seventeen_track", "acc-1")
                .unwrap()
                .id,
            device.id
        );
        assert_eq!(registry.get_by_config_entry_id("entry-1").len(), 1);
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_second_entry_joins_existing_device() {
        let registry = DeviceRegistry::new();
        registry.get_or_create("entry-1", &account_info("acc-1"));
        let device = registry.get_or_create("entry-2", &account_info("acc-1"));

        assert_eq!(device.config_entries, vec!["entry-1", "entry-2"]);
        assert_eq!(registry.get_by_config_entry_id("entry-2").len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_clear_config_entry() {
        let registry = DeviceRegistry::new();
        registry.get_or_create("entry-1", &account_info("acc-1"));
        registry.get_or_create("entry-2", &account_info("acc-1"));
        registry.get_or_create("entry-1", &account_info("acc-2"));

        assert_eq!(registry.clear_config_entry("entry-1"), 1);
        assert_eq!(registry.len(), 1);

        let shared = registry.get_by_identifier("seventeen_track", "acc-1").unwrap();
        assert_eq!(shared.config_entries, vec!["entry-2"]);
        assert_eq!(shared.primary_config_entry.as_deref(), Some("entry-2"));
        assert!(registry.get_by_identifier("seventeen_track", "acc-2").is_none());
    }
}
