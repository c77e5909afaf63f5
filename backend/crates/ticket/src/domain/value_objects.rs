//! Domain Value Objects

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_SUBSCRIPTION_ID_LEN: usize = 128;

/// Identifier of a mailing-list style subscription that lets a known sender
/// skip proof of work for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Empty strings mean "no subscription" and yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_SUBSCRIPTION_ID_LEN {
            return None;
        }
        Some(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(SubscriptionId::parse(" list-42 ").unwrap().as_str(), "list-42");
        assert!(SubscriptionId::parse("").is_none());
        assert!(SubscriptionId::parse("   ").is_none());
        assert!(SubscriptionId::parse(&"x".repeat(129)).is_none());
    }
}
