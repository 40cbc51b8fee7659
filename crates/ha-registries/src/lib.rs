//! Home Assistant Registries
//!
//! This crate provides the device registry integrations use to group their
//! entities and that service handlers use to resolve a `device_id` back to
//! the config entries owning it. The registry is in-memory only.

pub mod device_registry;

pub use device_registry::{
    DeviceEntry, DeviceEntryType, DeviceIdentifier, DeviceInfo, DeviceRegistry,
};
