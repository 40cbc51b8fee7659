//! Config entry lifecycle transitions
//!
//! ```text
//! NotLoaded ─▶ SetupInProgress ─▶ Loaded
//!                   │  ▲      └─▶ SetupError ─┐
//!                   ▼  │                      │
//!                SetupRetry ──────────────────┤
//!                                             ▼
//! Loaded ───────────────────────────▶ UnloadInProgress ─▶ NotLoaded
//!                                                     └─▶ FailedUnload
//! ```

use crate::entry::ConfigEntryState;
use std::time::Duration;
use thiserror::Error;

/// Error when an invalid state transition is attempted
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid config entry transition from {from:?} to {to:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConfigEntryState,
    pub to: ConfigEntryState,
    pub reason: &'static str,
}

impl ConfigEntryState {
    /// Validate a transition to `to`, returning the new state.
    pub fn try_transition(self, to: ConfigEntryState) -> Result<ConfigEntryState, InvalidTransition> {
        use ConfigEntryState::*;

        let allowed = matches!(
            (self, to),
            (NotLoaded, SetupInProgress)
                | (SetupInProgress, Loaded | SetupError | SetupRetry)
                | (SetupError | SetupRetry, SetupInProgress | UnloadInProgress)
                | (Loaded, UnloadInProgress)
                | (UnloadInProgress, NotLoaded | FailedUnload)
        );

        if allowed {
            return Ok(to);
        }

        let reason = match (self, to) {
            (FailedUnload, _) => "entry failed to unload and cannot recover",
            (Loaded, SetupInProgress) => "entry is loaded; unload it first",
            (SetupInProgress, _) => "setup is still running",
            (UnloadInProgress, _) => "unload is still running",
            (_, Loaded | SetupError | SetupRetry) => "setup results require SetupInProgress",
            (_, NotLoaded) => "entries return to NotLoaded only through an unload",
            _ => "transition not part of the entry lifecycle",
        };
        Err(InvalidTransition {
            from: self,
            to,
            reason,
        })
    }

    /// Check if a transition is valid without performing it
    pub fn can_transition_to(self, to: ConfigEntryState) -> bool {
        self.try_transition(to).is_ok()
    }
}

/// Backoff before the next setup attempt of an entry in `SetupRetry`.
///
/// 5s doubled per failed try, capped at 80s, plus up to 100ms of jitter.
pub fn calculate_retry_delay(tries: u32) -> Duration {
    let base = 5u64 << tries.min(4);
    let jitter_ms = rand::random::<u64>() % 100;
    Duration::from_secs(base) + Duration::from_millis(jitter_ms)
}
