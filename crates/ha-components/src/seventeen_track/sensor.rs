//! Package tracking sensors
//!
//! One sensor per status in the summary (`<name> packages <status>`) and
//! one for all packages (`<name> all packages`). States are package counts;
//! the `packages` attribute lists the matching packages by tracking number.

use std::collections::HashMap;
use std::sync::Arc;

use ha_config_entries::ConfigEntry;
use ha_core::consts::{ATTR_FRIENDLY_NAME, ATTR_LOCATION, CONF_NAME};
use ha_core::util::slugify;
use ha_helpers::{CoordinatorEntity, EntityPlatform, PlatformHandle};
use ha_registries::{DeviceEntryType, DeviceIdentifier, DeviceInfo};
use seventeentrack::Package;
use serde_json::{json, Map, Value};

use super::consts::{
    ATTRIBUTION, ATTR_DESTINATION_COUNTRY, ATTR_INFO_TEXT, ATTR_ORIGIN_COUNTRY, ATTR_PACKAGES,
    ATTR_PACKAGE_TYPE, ATTR_STATUS, ATTR_TIMESTAMP, ATTR_TRACKING_INFO_LANGUAGE, DEFAULT_NAME,
    DOMAIN, ICON, MANUFACTURER, UNIT_PACKAGES,
};
use super::coordinator::{SeventeenTrackCoordinator, SeventeenTrackData};

type Sensor = Arc<dyn CoordinatorEntity<SeventeenTrackData>>;

/// What a sensor counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorKind {
    /// Packages in one status
    Summary(String),
    /// All packages
    AllPackages,
}

pub struct SeventeenTrackSensor {
    kind: SensorKind,
    entry_name: String,
    account_id: String,
    name: String,
}

impl SeventeenTrackSensor {
    pub fn new(entry_name: &str, account_id: &str, kind: SensorKind) -> Self {
        let name = match &kind {
            SensorKind::Summary(status) => format!("{entry_name} packages {status}"),
            SensorKind::AllPackages => format!("{entry_name} all packages"),
        };
        Self {
            kind,
            entry_name: entry_name.to_string(),
            account_id: account_id.to_string(),
            name,
        }
    }

    pub fn kind(&self) -> &SensorKind {
        &self.kind
    }

    fn matches(&self, package: &Package) -> bool {
        match &self.kind {
            SensorKind::Summary(status) => &package.status == status,
            SensorKind::AllPackages => true,
        }
    }
}

impl CoordinatorEntity<SeventeenTrackData> for SeventeenTrackSensor {
    fn unique_id(&self) -> String {
        format!("{}-{}", self.account_id, slugify(&self.name))
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn native_value(&self, data: &SeventeenTrackData) -> String {
        match &self.kind {
            SensorKind::Summary(status) => {
                data.summary.get(status).copied().unwrap_or(0).to_string()
            }
            SensorKind::AllPackages => data.packages.len().to_string(),
        }
    }

    /// Rebuilt from the current data on every call
    fn extra_state_attributes(&self, data: &SeventeenTrackData) -> HashMap<String, Value> {
        let listed: Map<String, Value> = data
            .packages
            .iter()
            .filter(|package| self.matches(package))
            .map(|package| (package.tracking_number.clone(), package_details(package)))
            .collect();

        let mut attributes = HashMap::new();
        if !listed.is_empty() {
            attributes.insert(ATTR_PACKAGES.to_string(), Value::Object(listed));
        }
        attributes
    }

    fn icon(&self) -> Option<&str> {
        Some(ICON)
    }

    fn unit_of_measurement(&self) -> Option<&str> {
        Some(UNIT_PACKAGES)
    }

    fn attribution(&self) -> Option<&str> {
        Some(ATTRIBUTION)
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(DeviceInfo {
            identifiers: vec![DeviceIdentifier::new(DOMAIN, self.account_id.as_str())],
            default_name: Some(self.entry_name.clone()),
            manufacturer: Some(MANUFACTURER.to_string()),
            entry_type: Some(DeviceEntryType::Service),
        })
    }
}

fn package_details(package: &Package) -> Value {
    json!({
        ATTR_FRIENDLY_NAME: package.friendly_name,
        ATTR_INFO_TEXT: package.info_text,
        ATTR_TIMESTAMP: package.timestamp.map(|ts| ts.to_rfc3339()),
        ATTR_STATUS: package.status,
        ATTR_LOCATION: package.location,
        ATTR_TRACKING_INFO_LANGUAGE: package.tracking_info_language,
        ATTR_PACKAGE_TYPE: package.package_type,
        ATTR_ORIGIN_COUNTRY: package.origin_country,
        ATTR_DESTINATION_COUNTRY: package.destination_country,
    })
}

/// Sensors for an entry, derived from the statuses present in `data`
pub fn build_sensors(entry_name: &str, account_id: &str, data: &SeventeenTrackData) -> Vec<Sensor> {
    data.summary
        .keys()
        .map(|status| SensorKind::Summary(status.clone()))
        .chain(std::iter::once(SensorKind::AllPackages))
        .map(|kind| Arc::new(SeventeenTrackSensor::new(entry_name, account_id, kind)) as Sensor)
        .collect()
}

/// Set up the sensor platform for a loaded entry
pub fn setup_entry(
    platform: &EntityPlatform,
    entry: &ConfigEntry,
    coordinator: &SeventeenTrackCoordinator,
) -> PlatformHandle {
    let entry_name = entry.data_str(CONF_NAME).unwrap_or(DEFAULT_NAME);
    let account_id = coordinator.updater().account_id();
    let sensors = coordinator
        .data()
        .map(|data| build_sensors(entry_name, account_id, &data))
        .unwrap_or_default();

    platform.add_entities(&entry.entry_id, coordinator.subscribe(), sensors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use seventeentrack::PACKAGE_STATUSES;

    fn package(tracking_number: &str, status: &str) -> Package {
        Package {
            id: tracking_number.to_string(),
            tracking_number: tracking_number.to_string(),
            friendly_name: Some(format!("name {tracking_number}")),
            status: status.to_string(),
            info_text: Some("info".to_string()),
            location: "Leipzig".to_string(),
            timestamp: Some(
                chrono::FixedOffset::east_opt(7200)
                    .unwrap()
                    .with_ymd_and_hms(2020, 8, 10, 12, 32, 0)
                    .unwrap(),
            ),
            origin_country: "China".to_string(),
            destination_country: "Germany".to_string(),
            package_type: "Unknown".to_string(),
            tracking_info_language: "Unknown".to_string(),
            carrier: 0,
        }
    }

    fn data() -> SeventeenTrackData {
        let mut summary: seventeentrack::Summary = PACKAGE_STATUSES
            .iter()
            .map(|(_, label)| (label.to_string(), 0))
            .collect();
        summary.insert("In Transit".to_string(), 1);
        summary.insert("Delivered".to_string(), 1);
        SeventeenTrackData {
            packages: vec![package("456", "In Transit"), package("789", "Delivered")],
            summary,
        }
    }

    #[test]
    fn test_one_sensor_per_status_plus_all() {
        let sensors = build_sensors("17Track", "acct", &data());
        assert_eq!(sensors.len(), 8);
        assert_eq!(sensors[1].name(), "17Track packages In Transit");
        assert_eq!(sensors[1].unique_id(), "acct-17track_packages_in_transit");
        assert_eq!(sensors[7].name(), "17Track all packages");
        assert_eq!(sensors[7].unique_id(), "acct-17track_all_packages");
    }

    #[test]
    fn test_summary_sensor_filters_packages_by_status() {
        let sensors = build_sensors("17Track", "acct", &data());
        let in_transit = &sensors[1];
        let data = data();

        assert_eq!(in_transit.native_value(&data), "1");
        let attrs = in_transit.extra_state_attributes(&data);
        let listed = attrs[ATTR_PACKAGES].as_object().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed["456"][ATTR_STATUS], "In Transit");
        assert_eq!(listed["456"][ATTR_FRIENDLY_NAME], "name 456");
        assert_eq!(listed["456"][ATTR_TIMESTAMP], "2020-08-10T12:32:00+02:00");
        assert_eq!(listed["456"][ATTR_LOCATION], "Leipzig");
    }

    #[test]
    fn test_empty_status_has_no_packages_attribute() {
        let sensors = build_sensors("17Track", "acct", &data());
        let expired = &sensors[2];
        let data = data();

        assert_eq!(expired.native_value(&data), "0");
        assert!(!expired.extra_state_attributes(&data).contains_key(ATTR_PACKAGES));
    }

    #[test]
    fn test_all_packages_sensor() {
        let sensors = build_sensors("17Track", "acct", &data());
        let all = sensors.last().unwrap();
        let data = data();

        assert_eq!(all.native_value(&data), "2");
        let attrs = all.extra_state_attributes(&data);
        assert_eq!(attrs[ATTR_PACKAGES].as_object().unwrap().len(), 2);
        assert_eq!(all.icon(), Some(ICON));
        assert_eq!(all.unit_of_measurement(), Some("packages"));
        assert_eq!(all.attribution(), Some(ATTRIBUTION));

        let device = all.device_info().unwrap();
        assert_eq!(device.identifiers, vec![DeviceIdentifier::new(DOMAIN, "acct")]);
        assert_eq!(device.default_name.as_deref(), Some("17Track"));
    }

    #[test]
    fn test_attributes_are_recomputed() {
        let sensors = build_sensors("17Track", "acct", &data());
        let in_transit = &sensors[1];
        assert!(in_transit
            .extra_state_attributes(&data())
            .contains_key(ATTR_PACKAGES));

        let emptied = SeventeenTrackData {
            packages: Vec::new(),
            summary: data().summary,
        };
        assert!(in_transit.extra_state_attributes(&emptied).is_empty());
    }
}
