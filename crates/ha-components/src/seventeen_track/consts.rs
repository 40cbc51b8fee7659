//! Constants of the 17Track integration

pub const DOMAIN: &str = "seventeen_track";

pub const DEFAULT_NAME: &str = "17Track";
/// Minutes between refreshes
pub const DEFAULT_SCAN_INTERVAL: u64 = 10;
pub const DEFAULT_SHOW_ARCHIVED: bool = false;

pub const CONF_SHOW_ARCHIVED: &str = "show_archived";
pub const CONF_TRACKING_NUMBER: &str = "tracking_number";
pub const CONF_CARRIER_NAME: &str = "carrier_name";

pub const SERVICE_ADD_PACKAGE: &str = "add_package";

pub const ATTR_DESTINATION_COUNTRY: &str = "destination_country";
pub const ATTR_INFO_TEXT: &str = "info_text";
pub const ATTR_TIMESTAMP: &str = "timestamp";
pub const ATTR_ORIGIN_COUNTRY: &str = "origin_country";
pub const ATTR_PACKAGES: &str = "packages";
pub const ATTR_PACKAGE_TYPE: &str = "package_type";
pub const ATTR_STATUS: &str = "status";
pub const ATTR_TRACKING_INFO_LANGUAGE: &str = "tracking_info_language";

pub const ATTRIBUTION: &str = "Data provided by 17track.net";
pub const ICON: &str = "mdi:package";
pub const UNIT_PACKAGES: &str = "packages";
pub const MANUFACTURER: &str = "17Track";

/// Entity platforms this integration sets up
pub const PLATFORM_SENSOR: &str = "sensor";
