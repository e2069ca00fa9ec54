//! Event sources.
//!
//! A source is whatever raises check events: the monitoring core's callback
//! registry, a channel fed by another thread, or a synthetic generator in
//! tests. Handlers subscribe per [`CallbackKind`] and are invoked once per
//! event on that callback.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{BrokerEvent, CallbackKind};

pub mod channel;
pub mod synthetic;
pub mod wire;

pub use channel::{ChannelSender, ChannelSource};
pub use synthetic::{SyntheticEvents, SyntheticSource};

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Receives events from a source.
pub trait EventHandler: Send + Sync {
    /// Handle one event. Must not block the caller on I/O it cannot bound.
    fn on_event(&self, event: &BrokerEvent);
}

/// Something handlers can subscribe to.
pub trait EventSource {
    /// Deliver events raised on `callback` to `handler` until unsubscribed.
    fn subscribe(&self, callback: CallbackKind, handler: Arc<dyn EventHandler>) -> SubscriptionId;

    /// Remove a subscription. Returns false if `id` was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

struct Subscription {
    id: SubscriptionId,
    callback: CallbackKind,
    handler: Arc<dyn EventHandler>,
}

/// In-process subscription registry.
///
/// Delivery is synchronous on the publishing thread, in subscription order.
#[derive(Default)]
pub struct EventBus {
    subs: RwLock<Vec<Subscription>>,
}

impl EventBus {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every handler subscribed to its callback.
    ///
    /// Returns the number of handlers invoked. The registry lock is released
    /// before handlers run, so a handler may subscribe or unsubscribe.
    pub fn publish(&self, event: &BrokerEvent) -> usize {
        let handlers: Vec<Arc<dyn EventHandler>> = match self.subs.read() {
            Ok(subs) => subs
                .iter()
                .filter(|s| s.callback == event.callback)
                .map(|s| Arc::clone(&s.handler))
                .collect(),
            Err(_) => return 0,
        };
        for h in &handlers {
            h.on_event(event);
        }
        handlers.len()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.read().map(|s| s.len()).unwrap_or(0)
    }

    /// True when nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, callback: CallbackKind, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId::new();
        if let Ok(mut subs) = self.subs.write() {
            subs.push(Subscription { id, callback, handler });
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let Ok(mut subs) = self.subs.write() else {
            return false;
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        subs.len() != before
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("subscriptions", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::event::CheckEvent;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl EventHandler for Counter {
        fn on_event(&self, _event: &BrokerEvent) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn host_event() -> BrokerEvent {
        BrokerEvent::processed(CheckEvent::host("web01", Utc::now()))
    }

    #[test]
    fn test_subscription_id_serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let id = SubscriptionId::from_uuid(uuid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
        assert_eq!(serde_json::from_str::<SubscriptionId>(&json).unwrap(), id);
        assert_ne!(SubscriptionId::new(), id);
    }

    #[test]
    fn test_delivery_follows_callback() {
        let bus = EventBus::new();
        let hosts = Arc::new(Counter::default());
        let services = Arc::new(Counter::default());
        bus.subscribe(CallbackKind::HostCheck, hosts.clone());
        bus.subscribe(CallbackKind::ServiceCheck, services.clone());

        assert_eq!(bus.publish(&host_event()), 1);
        assert_eq!(hosts.0.load(Ordering::Relaxed), 1);
        assert_eq!(services.0.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let c = Arc::new(Counter::default());
        let id = bus.subscribe(CallbackKind::HostCheck, c.clone());

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(bus.is_empty());
        assert_eq!(bus.publish(&host_event()), 0);
        assert_eq!(c.0.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_handler_may_unsubscribe_itself() {
        struct OneShot {
            bus: Arc<EventBus>,
            id: RwLock<Option<SubscriptionId>>,
        }
        impl EventHandler for OneShot {
            fn on_event(&self, _event: &BrokerEvent) {
                if let Some(id) = self.id.write().unwrap().take() {
                    self.bus.unsubscribe(id);
                }
            }
        }

        let bus = Arc::new(EventBus::new());
        let h = Arc::new(OneShot {
            bus: Arc::clone(&bus),
            id: RwLock::new(None),
        });
        let id = bus.subscribe(CallbackKind::HostCheck, h.clone());
        *h.id.write().unwrap() = Some(id);

        assert_eq!(bus.publish(&host_event()), 1);
        assert_eq!(bus.publish(&host_event()), 0);
    }
}
