//! Bridges the event loop's ingress stream to the [`EventBus`].
//!
//! Thin adapter: wraps every decoded `(MavHeader, MavMessage)` into a
//! [`MavMessageEvent`] and publishes it. `attach()` is idempotent — the event
//! loop only ever calls it once per connection, but a second call (e.g. from
//! a test exercising the same router) must not double-register delivery.

use crate::event_bus::{EventBus, MavMessageEvent};
use mavlink::common::MavMessage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

pub(crate) struct MessageRouter {
    bus: Arc<EventBus>,
    attached: AtomicBool,
}

impl MessageRouter {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            attached: AtomicBool::new(false),
        }
    }

    /// Marks the router as attached to its ingress stream. A no-op (logged at
    /// `debug`) on the second and later calls.
    pub fn attach(&self) {
        if self.attached.swap(true, Ordering::SeqCst) {
            debug!("MessageRouter::attach called while already attached");
        }
    }

    pub fn route(&self, message: &MavMessage) {
        self.bus.publish_message(MavMessageEvent {
            timestamp: Instant::now(),
            message_type: message.message_name(),
            message: message.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventPriority;
    use std::sync::atomic::AtomicUsize;

    fn sample() -> MavMessage {
        MavMessage::HEARTBEAT(mavlink::common::HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: mavlink::common::MavType::MAV_TYPE_QUADROTOR,
            autopilot: mavlink::common::MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA,
            base_mode: mavlink::common::MavModeFlag::empty(),
            system_status: mavlink::common::MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        })
    }

    #[test]
    fn attach_twice_does_not_panic_or_double_register() {
        let bus = Arc::new(EventBus::new());
        let router = MessageRouter::new(bus.clone());
        router.attach();
        router.attach();

        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        bus.subscribe_message("HEARTBEAT", EventPriority::Normal, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });

        router.route(&sample());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn route_delivers_to_subscribers() {
        let bus = Arc::new(EventBus::new());
        let router = MessageRouter::new(bus.clone());
        router.attach();

        let count = Arc::new(AtomicUsize::new(0));
        let c1 = count.clone();
        bus.subscribe_all_messages(EventPriority::Normal, move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });

        router.route(&sample());
        router.route(&sample());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
