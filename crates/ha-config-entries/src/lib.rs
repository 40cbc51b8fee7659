//! Config Entries
//!
//! This crate provides the configuration entry system. A config entry is
//! one configured instance of an integration (for example one tracking
//! account); the manager drives its lifecycle by calling the integration's
//! entry points and translating their errors into entry states.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`Integration`] - Entry points an integration exposes to the host
//! - [`ConfigEntries`] - Manager for all config entries

pub mod entry;
pub mod integration;
pub mod manager;
pub mod state_machine;

// Re-export main types
pub use entry::{ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate};

pub use integration::Integration;

pub use manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};

pub use state_machine::{calculate_retry_delay, InvalidTransition};
