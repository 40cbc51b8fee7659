//! Errors integrations raise back to the host
//!
//! The config-entries manager decides what happens to an entry from the
//! variant an integration returns: auth failures park the entry in
//! `SetupError`, not-ready failures schedule a setup retry.

use thiserror::Error;

/// Error returned by integration entry points
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HomeAssistantError {
    /// Credentials were rejected; setup is not retried until the user reauthenticates
    #[error("authentication failed: {0}")]
    ConfigEntryAuthFailed(String),

    /// The remote side is not reachable yet; the host retries setup later
    #[error("{0}")]
    ConfigEntryNotReady(String),

    /// Setup failed permanently for a reason other than authentication
    #[error("{0}")]
    ConfigEntryError(String),
}

impl HomeAssistantError {
    /// Whether the host should schedule another setup attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, HomeAssistantError::ConfigEntryNotReady(_))
    }
}

/// A data refresh failed; the previous data stays in place
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct UpdateFailed(pub String);

impl UpdateFailed {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<UpdateFailed> for HomeAssistantError {
    fn from(err: UpdateFailed) -> Self {
        HomeAssistantError::ConfigEntryNotReady(err.0)
    }
}
