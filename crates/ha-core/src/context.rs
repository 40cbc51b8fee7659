//! Origin of a state write or service call

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifies one action, such as a service call or a refresh that wrote
/// states. Every state remembers the context of the write that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// ULID
    pub id: String,
}

impl Context {
    pub fn new() -> Self {
        Self {
            id: Ulid::new().to_string(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_contexts_are_distinct() {
        let first = Context::new();
        let second = Context::new();
        assert_ne!(first, second);
        assert_eq!(first.id.len(), 26);
    }
}
