//! Subscription registry and pending value cache.
//!
//! Maps save identities to weak handles of live objects. The registry never
//! keeps an object alive; dropped objects resolve to [`SubscriberRef::Expired`]
//! and are skipped.

use crate::core::{GameSave, LoadMode, Payload};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Result of resolving a subscription's weak handle.
pub enum SubscriberRef {
    Live(Arc<dyn GameSave>),
    Expired,
}

#[derive(Clone)]
pub struct Subscription {
    pub identity: String,
    pub priority: i32,
    pub load_mode: LoadMode,
    pub is_shared: bool,
    /// Registration order, breaks priority ties.
    pub sequence: u64,
    target: Weak<dyn GameSave>,
}

impl Subscription {
    pub fn resolve(&self) -> SubscriberRef {
        match self.target.upgrade() {
            Some(target) => SubscriberRef::Live(target),
            None => SubscriberRef::Expired,
        }
    }

    pub fn is_live(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("identity", &self.identity)
            .field("priority", &self.priority)
            .field("load_mode", &self.load_mode)
            .field("is_shared", &self.is_shared)
            .field("sequence", &self.sequence)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Last known snapshot of an object's state.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingValue {
    pub payload: Payload,
    pub is_shared: bool,
    sequence: u64,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: HashMap<String, Subscription>,
    values: HashMap<String, PendingValue>,
    next_sequence: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    /// Registers `target`, replacing any earlier subscription with the same identity.
    pub fn register(&mut self, target: &Arc<dyn GameSave>, priority: i32) -> Subscription {
        let subscription = Subscription {
            identity: target.save_id(),
            priority,
            load_mode: target.load_mode(),
            is_shared: target.is_shared(),
            sequence: self.bump_sequence(),
            target: Arc::downgrade(target),
        };
        self.subscriptions
            .insert(subscription.identity.clone(), subscription.clone());
        subscription
    }

    pub fn get(&self, identity: &str) -> Option<&Subscription> {
        self.subscriptions.get(identity)
    }

    pub fn is_subscribed(&self, identity: &str) -> bool {
        self.subscriptions
            .get(identity)
            .is_some_and(Subscription::is_live)
    }

    pub fn live_count(&self) -> usize {
        self.subscriptions.values().filter(|s| s.is_live()).count()
    }

    /// Drops subscriptions whose object is gone. Returns how many were removed.
    pub fn prune_expired(&mut self) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|_, subscription| subscription.is_live());
        before - self.subscriptions.len()
    }

    /// Live subscriptions in registration order.
    pub fn live_targets(&self) -> Vec<(Subscription, Arc<dyn GameSave>)> {
        let mut live: Vec<_> = self
            .subscriptions
            .values()
            .filter_map(|subscription| match subscription.resolve() {
                SubscriberRef::Live(target) => Some((subscription.clone(), target)),
                SubscriberRef::Expired => None,
            })
            .collect();
        live.sort_by_key(|(subscription, _)| subscription.sequence);
        live
    }

    /// Every subscription, highest priority first. Equal priorities keep registration order.
    pub fn restore_order(&self) -> Vec<Subscription> {
        let mut ordered: Vec<_> = self.subscriptions.values().cloned().collect();
        ordered.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
        ordered
    }

    pub fn cached_value(&self, identity: &str) -> Option<Payload> {
        self.values.get(identity).map(|value| value.payload.clone())
    }

    pub fn store_value(&mut self, identity: &str, payload: Payload, is_shared: bool) {
        if let Some(existing) = self.values.get_mut(identity) {
            existing.payload = payload;
            existing.is_shared = is_shared;
            return;
        }
        let sequence = self.bump_sequence();
        self.values.insert(
            identity.to_string(),
            PendingValue {
                payload,
                is_shared,
                sequence,
            },
        );
    }

    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Pending values in the order their identities were first cached.
    pub fn pending_values(&self) -> Vec<(String, PendingValue)> {
        let mut values: Vec<_> = self
            .values
            .iter()
            .map(|(identity, value)| (identity.clone(), value.clone()))
            .collect();
        values.sort_by_key(|(_, value)| value.sequence);
        values
    }

    /// Cached identities split into per-slot and shared, in cache order.
    pub fn known_identities(&self) -> (Vec<String>, Vec<String>) {
        let (shared, per_slot): (Vec<_>, Vec<_>) = self
            .pending_values()
            .into_iter()
            .partition(|(_, value)| value.is_shared);
        (
            per_slot.into_iter().map(|(identity, _)| identity).collect(),
            shared.into_iter().map(|(identity, _)| identity).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Result;
    use async_trait::async_trait;
    use serde_json::json;

    struct Probe {
        id: &'static str,
        shared: bool,
    }

    #[async_trait]
    impl GameSave for Probe {
        fn save_id(&self) -> String {
            self.id.to_string()
        }

        fn is_shared(&self) -> bool {
            self.shared
        }

        fn save_data(&self) -> Result<Payload> {
            Ok(json!(self.id))
        }

        async fn on_load(&self, _payload: Option<Payload>) -> Result<()> {
            Ok(())
        }
    }

    fn probe(id: &'static str) -> Arc<dyn GameSave> {
        Arc::new(Probe { id, shared: false })
    }

    #[test]
    fn test_dropped_target_resolves_expired() {
        let mut registry = SubscriptionRegistry::new();
        let target = probe("a");
        let subscription = registry.register(&target, 0);
        assert!(matches!(subscription.resolve(), SubscriberRef::Live(_)));
        assert_eq!(registry.live_count(), 1);

        drop(target);
        assert!(matches!(subscription.resolve(), SubscriberRef::Expired));
        assert_eq!(registry.live_count(), 0);
        assert!(registry.live_targets().is_empty());
        assert_eq!(registry.prune_expired(), 1);
        assert!(registry.get("a").is_none());
    }

    #[test]
    fn test_later_registration_replaces() {
        let mut registry = SubscriptionRegistry::new();
        let first = probe("a");
        let second = probe("a");
        registry.register(&first, 1);
        registry.register(&second, 9);

        let subscription = registry.get("a").unwrap();
        assert_eq!(subscription.priority, 9);
        match subscription.resolve() {
            SubscriberRef::Live(target) => assert!(Arc::ptr_eq(&target, &second)),
            SubscriberRef::Expired => panic!("replacement should be live"),
        }
    }

    #[test]
    fn test_restore_order_priority_then_registration() {
        let mut registry = SubscriptionRegistry::new();
        let targets = [probe("low"), probe("high"), probe("mid-1"), probe("mid-2")];
        registry.register(&targets[0], 1);
        registry.register(&targets[1], 10);
        registry.register(&targets[2], 5);
        registry.register(&targets[3], 5);

        let order: Vec<_> = registry
            .restore_order()
            .into_iter()
            .map(|s| s.identity)
            .collect();
        assert_eq!(order, vec!["high", "mid-1", "mid-2", "low"]);
    }

    #[test]
    fn test_known_identities_split_by_sharing() {
        let mut registry = SubscriptionRegistry::new();
        registry.store_value("player", json!(1), false);
        registry.store_value("options", json!(2), true);
        registry.store_value("chest", json!(3), false);
        registry.store_value("player", json!(4), false);

        let (per_slot, shared) = registry.known_identities();
        assert_eq!(per_slot, vec!["player", "chest"]);
        assert_eq!(shared, vec!["options"]);
        assert_eq!(registry.cached_value("player"), Some(json!(4)));

        registry.clear_values();
        assert_eq!(registry.value_count(), 0);
    }

    #[test]
    fn test_shared_probe_flag_is_recorded() {
        let mut registry = SubscriptionRegistry::new();
        let target: Arc<dyn GameSave> = Arc::new(Probe {
            id: "settings",
            shared: true,
        });
        let subscription = registry.register(&target, 0);
        assert!(subscription.is_shared);
        assert_eq!(subscription.load_mode, LoadMode::Lazy);
    }
}
