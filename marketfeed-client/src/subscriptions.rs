//! Subscription bookkeeping across reconnects
//!
//! The registry holds the *intended* topic set. Wire effects are optimistic;
//! the tracked set is replayed after every successful (re)connection so the
//! server-side set converges back to it.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Authoritative set of topics the application wants live data for
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: RwLock<HashSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a topic to the tracked set. Returns `false` if it was already
    /// tracked (the caller then skips the duplicate wire frame).
    pub fn track(&self, topic: &str) -> bool {
        self.topics.write().insert(topic.to_string())
    }

    /// Remove a topic from the tracked set. Applies regardless of connection
    /// state so a later replay does not resurrect it. Returns whether the
    /// topic was tracked.
    pub fn untrack(&self, topic: &str) -> bool {
        self.topics.write().remove(topic)
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.read().contains(topic)
    }

    /// Sorted view of the tracked set.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.read().iter().cloned().collect();
        topics.sort();
        topics
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.track("AAPL"));
        assert!(!registry.track("AAPL"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn untrack_applies_while_disconnected() {
        let registry = SubscriptionRegistry::new();
        registry.track("AAPL");
        registry.track("TSLA");
        assert!(registry.untrack("AAPL"));
        assert!(!registry.untrack("AAPL"));
        assert_eq!(registry.topics(), vec!["TSLA".to_string()]);
    }

    #[test]
    fn untrack_during_replay_still_applies() {
        let registry = SubscriptionRegistry::new();
        for topic in ["A", "B", "C"] {
            registry.track(topic);
        }

        // The connection loop replays from a snapshot; the set stays live
        // for concurrent mutation, so a removal issued mid-replay is never
        // a no-op.
        let snapshot = registry.topics();
        assert!(registry.untrack("B"));
        assert!(!registry.contains("B"));

        assert_eq!(snapshot, vec!["A", "B", "C"]);
        assert_eq!(registry.topics(), vec!["A", "C"]);
    }
}
