//! Integration helpers
//!
//! Building blocks integrations share on top of the core crates:
//!
//! - [`HomeAssistant`] - handle to the running instance's registries
//! - [`DataUpdateCoordinator`] - periodic fetch owner that entities subscribe to
//! - [`EntityPlatform`] - publishes coordinator-backed entities to the state store

pub mod entity;
pub mod hass;
pub mod update_coordinator;

pub use entity::{CoordinatorEntity, EntityPlatform, PlatformHandle};
pub use hass::HomeAssistant;
pub use update_coordinator::{CoordinatorState, DataUpdate, DataUpdateCoordinator};
