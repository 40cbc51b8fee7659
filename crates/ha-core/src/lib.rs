//! Core types for Home Assistant
//!
//! This crate provides the fundamental types shared by the host crates and
//! the integrations built on them: EntityId, State, Context, ServiceCall and
//! the error taxonomy integrations use to report setup and update failures.

mod context;
mod entity_id;
mod exceptions;
mod service_call;
mod state;
pub mod util;

pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use exceptions::{HomeAssistantError, UpdateFailed};
pub use service_call::{ServiceCall, SupportsResponse};
pub use state::State;

/// Maximum length for a state value
pub const MAX_STATE_LENGTH: usize = 255;

/// State value used when actual state exceeds MAX_STATE_LENGTH
pub const STATE_UNKNOWN: &str = "unknown";

/// State value written for entities whose data source is failing
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// Well-known configuration and attribute keys
pub mod consts {
    pub const CONF_DEVICE_ID: &str = "device_id";
    pub const CONF_FRIENDLY_NAME: &str = "friendly_name";
    pub const CONF_NAME: &str = "name";
    pub const CONF_SCAN_INTERVAL: &str = "scan_interval";
    pub const CONF_TOKEN: &str = "token";

    pub const ATTR_ATTRIBUTION: &str = "attribution";
    pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";
    pub const ATTR_ICON: &str = "icon";
    pub const ATTR_LOCATION: &str = "location";
    pub const ATTR_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
}
