//! Priority-ordered typed publish/subscribe bus.
//!
//! Fans the single ingress message stream out to many subscribers without
//! coupling them to each other or to the event loop. Subscriptions are
//! identified by an opaque [`SubscriptionId`] returned from every
//! `subscribe_*` call; that token is the only way to remove a subscription,
//! which sidesteps identity-based removal bugs (a bound method compares
//! unequal to itself across calls in some languages — never an issue for a
//! token).

use mavlink::common::MavMessage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::error;

/// Handler priority. Lower values run first within a single publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventPriority {
    High = 0,
    Normal = 50,
    Low = 100,
}

/// A decoded MAVLink message, stamped with the time it was routed.
#[derive(Clone)]
pub struct MavMessageEvent {
    pub timestamp: Instant,
    pub message_type: &'static str,
    pub message: MavMessage,
}

/// A value carried by an [`AttributeChangedEvent`].
///
/// Deliberately a closed enum rather than `dyn Any`: every attribute this
/// crate projects fits one of these shapes, and closed matching lets
/// subscribers avoid downcasting.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    VehicleState(crate::state::VehicleState),
    Telemetry(crate::state::Telemetry),
    MissionState(crate::state::MissionState),
    LinkState(crate::state::LinkState),
    Param(f32),
    Text(String),
    Bool(bool),
    Attitude(crate::state::Attitude),
    Battery(crate::state::Battery),
    Gps(crate::state::GpsInfo),
}

#[derive(Clone)]
pub struct AttributeChangedEvent {
    pub timestamp: Instant,
    pub attribute_name: &'static str,
    pub old_value: Option<AttributeValue>,
    pub new_value: AttributeValue,
}

/// Opaque handle returned by every `subscribe_*` call. `unsubscribe` is the
/// only removal path; calling it twice is a harmless no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type MessageHandler = dyn Fn(&MavMessageEvent) + Send + Sync;
type AttributeHandler = dyn Fn(&AttributeChangedEvent) + Send + Sync;

#[derive(Clone)]
struct MessageSubscription {
    id: SubscriptionId,
    priority: EventPriority,
    handler: Arc<MessageHandler>,
}

#[derive(Clone)]
struct AttributeSubscription {
    id: SubscriptionId,
    priority: EventPriority,
    handler: Arc<AttributeHandler>,
}

#[derive(Default)]
struct Inner {
    message_handlers: std::collections::HashMap<&'static str, Vec<MessageSubscription>>,
    wildcard_handlers: Vec<MessageSubscription>,
    attribute_handlers: std::collections::HashMap<&'static str, Vec<AttributeSubscription>>,
}

/// Central event bus for routing MAVLink messages and attribute changes to
/// decoupled subscribers.
pub struct EventBus {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1),
        }
    }

    fn alloc_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn subscribe_message<F>(
        &self,
        message_type: &'static str,
        priority: EventPriority,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(&MavMessageEvent) + Send + Sync + 'static,
    {
        let id = self.alloc_id();
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        let handlers = inner.message_handlers.entry(message_type).or_default();
        handlers.push(MessageSubscription {
            id,
            priority,
            handler: Arc::new(handler),
        });
        handlers.sort_by_key(|s| s.priority);
        id
    }

    pub fn subscribe_all_messages<F>(&self, priority: EventPriority, handler: F) -> SubscriptionId
    where
        F: Fn(&MavMessageEvent) + Send + Sync + 'static,
    {
        let id = self.alloc_id();
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.wildcard_handlers.push(MessageSubscription {
            id,
            priority,
            handler: Arc::new(handler),
        });
        inner.wildcard_handlers.sort_by_key(|s| s.priority);
        id
    }

    pub fn subscribe_attribute<F>(
        &self,
        attribute_name: &'static str,
        priority: EventPriority,
        handler: F,
    ) -> SubscriptionId
    where
        F: Fn(&AttributeChangedEvent) + Send + Sync + 'static,
    {
        let id = self.alloc_id();
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        let handlers = inner.attribute_handlers.entry(attribute_name).or_default();
        handlers.push(AttributeSubscription {
            id,
            priority,
            handler: Arc::new(handler),
        });
        handlers.sort_by_key(|s| s.priority);
        id
    }

    /// Remove a subscription previously returned by any `subscribe_*` call.
    /// A no-op (not an error) if the id is unknown or already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        for handlers in inner.message_handlers.values_mut() {
            handlers.retain(|s| s.id != id);
        }
        inner.wildcard_handlers.retain(|s| s.id != id);
        for handlers in inner.attribute_handlers.values_mut() {
            handlers.retain(|s| s.id != id);
        }
    }

    pub fn publish_message(&self, event: MavMessageEvent) {
        let mut combined: Vec<MessageSubscription> = {
            let inner = self.inner.lock().expect("event bus lock poisoned");
            let mut combined = inner
                .message_handlers
                .get(event.message_type)
                .cloned()
                .unwrap_or_default();
            combined.extend(inner.wildcard_handlers.iter().cloned());
            combined
        };
        combined.sort_by_key(|s| s.priority);

        for sub in &combined {
            guarded_call(event.message_type, || (sub.handler)(&event));
        }
    }

    pub fn publish_attribute(&self, event: AttributeChangedEvent) {
        let mut combined: Vec<AttributeSubscription> = {
            let inner = self.inner.lock().expect("event bus lock poisoned");
            let mut combined = inner
                .attribute_handlers
                .get(event.attribute_name)
                .cloned()
                .unwrap_or_default();
            combined.extend(
                inner
                    .attribute_handlers
                    .get("*")
                    .cloned()
                    .unwrap_or_default(),
            );
            combined
        };
        combined.sort_by_key(|s| s.priority);

        for sub in &combined {
            guarded_call(event.attribute_name, || (sub.handler)(&event));
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("event bus lock poisoned");
        inner.message_handlers.clear();
        inner.wildcard_handlers.clear();
        inner.attribute_handlers.clear();
    }
}

/// Catches a handler panic so one bad subscriber cannot take down delivery to
/// the rest, mirroring the original design's "log and skip" contract for
/// handlers that raise.
fn guarded_call<F: FnOnce()>(context: &str, f: F) {
    if let Err(panic) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!("panic in handler for {context}: {msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn sample_event() -> MavMessageEvent {
        MavMessageEvent {
            timestamp: Instant::now(),
            message_type: "HEARTBEAT",
            message: MavMessage::HEARTBEAT(mavlink::common::HEARTBEAT_DATA {
                custom_mode: 0,
                mavtype: mavlink::common::MavType::MAV_TYPE_QUADROTOR,
                autopilot: mavlink::common::MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
                base_mode: mavlink::common::MavModeFlag::empty(),
                system_status: mavlink::common::MavState::MAV_STATE_ACTIVE,
                mavlink_version: 3,
            }),
        }
    }

    #[test]
    fn priority_order_high_before_low() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_low = order.clone();
        bus.subscribe_message("HEARTBEAT", EventPriority::Low, move |_| {
            order_low.lock().unwrap().push("low");
        });
        let order_high = order.clone();
        bus.subscribe_message("HEARTBEAT", EventPriority::High, move |_| {
            order_high.lock().unwrap().push("high");
        });
        let order_normal = order.clone();
        bus.subscribe_message("HEARTBEAT", EventPriority::Normal, move |_| {
            order_normal.lock().unwrap().push("normal");
        });

        bus.publish_message(sample_event());

        assert_eq!(*order.lock().unwrap(), vec!["high", "normal", "low"]);
    }

    #[test]
    fn wildcard_and_specific_both_invoked() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c1 = count.clone();
        bus.subscribe_message("HEARTBEAT", EventPriority::Normal, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = count.clone();
        bus.subscribe_all_messages(EventPriority::Normal, move |_| {
            c2.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish_message(sample_event());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        let id = bus.subscribe_message("HEARTBEAT", EventPriority::Normal, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish_message(sample_event());
        bus.unsubscribe(id);
        bus.publish_message(sample_event());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_twice_is_a_no_op() {
        let bus = EventBus::new();
        let id = bus.subscribe_message("HEARTBEAT", EventPriority::Normal, |_| {});
        bus.unsubscribe(id);
        bus.unsubscribe(id); // must not panic
    }

    #[test]
    fn attribute_wildcard_receives_all_names() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        bus.subscribe_attribute("*", EventPriority::Normal, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish_attribute(AttributeChangedEvent {
            timestamp: Instant::now(),
            attribute_name: "mode",
            old_value: None,
            new_value: AttributeValue::Text("GUIDED".to_string()),
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handler_panic_does_not_block_later_subscribers() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe_message("HEARTBEAT", EventPriority::High, |_| {
            panic!("boom");
        });
        let c1 = count.clone();
        bus.subscribe_message("HEARTBEAT", EventPriority::Low, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish_message(sample_event());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
