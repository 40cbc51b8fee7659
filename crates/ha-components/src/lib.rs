//! Home Assistant Components
//!
//! Integrations built on the host crates. Each component lives in its own
//! module and exposes an [`ha_config_entries::Integration`] implementation
//! plus whatever config flow helpers it needs.

pub mod seventeen_track;
