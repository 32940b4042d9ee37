//! In-process publish/subscribe event bus
//!
//! `EventBus` decouples agent-side components from the session bridge. It is
//! deliberately synchronous: `publish` runs every callback in the calling
//! context and never suspends, so it is safe to call from both sync and async
//! code. Anything that needs to perform I/O in response to an event enqueues
//! work from its callback and does the I/O elsewhere.
//!
//! There is no ambient singleton; an `Arc<EventBus>` is injected into every
//! component that needs one.

use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Opaque event payload: a JSON object the bus does not validate
pub type EventPayload = serde_json::Map<String, serde_json::Value>;

/// Subscriber callback. Errors are logged by the bus and never propagate to
/// the publisher or to other subscribers.
pub type EventCallback = dyn Fn(EventPayload) -> Result<()> + Send + Sync;

/// Opaque handle identifying one subscription; used only to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Publish/subscribe registry keyed by topic string.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<String, Vec<(SubscriptionId, Arc<EventCallback>)>>>,
}

impl EventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for a topic. Never fails; returns the id used to
    /// cancel the subscription later.
    pub fn subscribe<F>(&self, topic: &str, callback: F) -> SubscriptionId
    where
        F: Fn(EventPayload) -> Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscription. Returns `false` if the topic or id is unknown;
    /// calling twice with the same id is a no-op, not an error.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        let Some(entries) = subscribers.get_mut(topic) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(sub_id, _)| *sub_id != id);
        let removed = entries.len() < before;
        if entries.is_empty() {
            subscribers.remove(topic);
        }
        removed
    }

    /// Publish an event to every subscriber currently registered for `topic`.
    ///
    /// Each subscriber receives its own clone of the payload, so in-place
    /// mutation inside one callback cannot leak into another. The subscriber
    /// set is snapshotted before iteration; subscribe/unsubscribe calls made
    /// from inside a callback take effect for the next publish.
    pub fn publish(&self, topic: &str, payload: &EventPayload) {
        let snapshot: Vec<(SubscriptionId, Arc<EventCallback>)> = {
            let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
            match subscribers.get(topic) {
                Some(entries) => entries.clone(),
                None => return,
            }
        };

        for (id, callback) in snapshot {
            if let Err(e) = callback(payload.clone()) {
                tracing::warn!(topic, subscription = %id, "Event subscriber failed: {}", e);
            }
        }
    }

    /// Number of subscribers currently registered for a topic
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        subscribers.get(topic).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;
    use std::sync::Mutex;

    fn payload(key: &str, value: serde_json::Value) -> EventPayload {
        let mut map = EventPayload::new();
        map.insert(key.to_string(), value);
        map
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        bus.publish("nobody:listens", &payload("k", json!(1)));
        assert_eq!(bus.subscriber_count("nobody:listens"), 0);
    }

    #[test]
    fn test_subscribe_and_publish() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_cb = seen.clone();
        bus.subscribe("agent:state_change", move |p| {
            seen_cb.lock().unwrap().push(p);
            Ok(())
        });

        bus.publish("agent:state_change", &payload("state", json!("thinking")));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["state"], json!("thinking"));
    }

    #[test]
    fn test_unsubscribed_callback_not_invoked() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(0usize));

        let seen_cb = seen.clone();
        let id = bus.subscribe("tool:start", move |_| {
            *seen_cb.lock().unwrap() += 1;
            Ok(())
        });

        assert!(bus.unsubscribe("tool:start", id));
        bus.publish("tool:start", &payload("tool", json!("shell")));
        assert_eq!(*seen.lock().unwrap(), 0);
    }

    #[test]
    fn test_unsubscribe_unknown_is_false() {
        let bus = EventBus::new();
        let id = bus.subscribe("a", |_| Ok(()));
        assert!(!bus.unsubscribe("wrong-topic", id));
        assert!(bus.unsubscribe("a", id));
        assert!(!bus.unsubscribe("a", id));
    }

    #[test]
    fn test_payload_isolation_between_subscribers() {
        let bus = EventBus::new();
        let second_saw = Arc::new(Mutex::new(None));

        // First subscriber mutates its copy of the payload
        bus.subscribe("memory:cleared", |mut p| {
            p.insert("mutated".to_string(), json!(true));
            Ok(())
        });

        let second_saw_cb = second_saw.clone();
        bus.subscribe("memory:cleared", move |p| {
            *second_saw_cb.lock().unwrap() = Some(p);
            Ok(())
        });

        bus.publish("memory:cleared", &payload("reason", json!("reset")));

        let saw = second_saw.lock().unwrap();
        let p = saw.as_ref().unwrap();
        assert!(!p.contains_key("mutated"));
        assert_eq!(p["reason"], json!("reset"));
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(0usize));

        bus.subscribe("agent:error", |_| Err(Error::Internal("boom".to_string())));

        let seen_cb = seen.clone();
        bus.subscribe("agent:error", move |_| {
            *seen_cb.lock().unwrap() += 1;
            Ok(())
        });

        bus.publish("agent:error", &EventPayload::new());
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_subscribe_during_publish_applies_next_time() {
        let bus = Arc::new(EventBus::new());
        let late_calls = Arc::new(Mutex::new(0usize));

        let bus_cb = bus.clone();
        let late_calls_cb = late_calls.clone();
        bus.subscribe("session:pause", move |_| {
            let late = late_calls_cb.clone();
            bus_cb.subscribe("session:pause", move |_| {
                *late.lock().unwrap() += 1;
                Ok(())
            });
            Ok(())
        });

        bus.publish("session:pause", &EventPayload::new());
        assert_eq!(*late_calls.lock().unwrap(), 0);

        bus.publish("session:pause", &EventPayload::new());
        assert_eq!(*late_calls.lock().unwrap(), 1);
    }
}
