//! WebSocket relay state and channel fan-out.

pub mod protocol;
pub mod registry;
pub mod router;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use shared::{Event, Frame};
use tokio::sync::mpsc;

pub use registry::{ConnectionId, Outbound, Registry, SendOutcome};
pub use router::{Delivery, FanoutPolicy};

/// Default capacity of each connection's outbound queue.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay registry is unavailable")]
    Poisoned,
}

/// Snapshot for `GET /api/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RelayStats {
    pub connections: usize,
    pub channels: usize,
}

/// Relay state: the connection registry behind a single lock.
///
/// Every registry read and write, including a whole fan-out pass, happens
/// under that one lock, so events are routed one at a time in arrival order.
pub struct RelayState {
    registry: Mutex<Registry>,
    policy: FanoutPolicy,
    outbound_buffer: usize,
}

impl RelayState {
    pub fn new(policy: FanoutPolicy, outbound_buffer: usize) -> Self {
        Self {
            registry: Mutex::new(Registry::new()),
            policy,
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    pub fn policy(&self) -> FanoutPolicy {
        self.policy
    }

    fn registry(&self) -> Result<MutexGuard<'_, Registry>, RelayError> {
        self.registry.lock().map_err(|_| RelayError::Poisoned)
    }

    /// Register a new connection and return the queue its writer drains.
    pub fn connect(&self) -> Result<(ConnectionId, mpsc::Receiver<Outbound>), RelayError> {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        self.registry()?.register(id, tx);
        tracing::debug!(connection_id = %id, "connection registered");
        Ok((id, rx))
    }

    /// Returns `true` if the subscription is new.
    pub fn subscribe(&self, id: ConnectionId, channel: &str) -> Result<bool, RelayError> {
        let added = self.registry()?.subscribe(id, channel);
        if added {
            tracing::debug!(connection_id = %id, channel = %channel, "subscribed");
        }
        Ok(added)
    }

    /// Safe to call from both the reader and writer side, and more than once.
    pub fn disconnect(&self, id: ConnectionId) {
        // Unregister even through a poisoned lock.
        let mut registry = self
            .registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if registry.unregister(id) {
            tracing::debug!(connection_id = %id, "connection unregistered");
        }
    }

    /// Route an event to its target connections.
    pub fn publish(&self, event: &Event) -> Result<Delivery, RelayError> {
        let mut registry = self.registry()?;
        let delivery = router::fan_out(&mut registry, self.policy, event);
        drop(registry);
        tracing::debug!(
            kind = %event.kind,
            channel = event.channel.as_deref().unwrap_or("*"),
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            pruned = delivery.pruned,
            "event routed"
        );
        Ok(delivery)
    }

    /// Queue a frame for a single connection.
    pub fn send_to(&self, id: ConnectionId, frame: &Frame) -> Result<SendOutcome, RelayError> {
        let mut registry = self.registry()?;
        let outcome = registry.send(id, Arc::from(frame.to_json()));
        if outcome == SendOutcome::Closed {
            registry.unregister(id);
        }
        Ok(outcome)
    }

    pub fn stats(&self) -> Result<RelayStats, RelayError> {
        let registry = self.registry()?;
        Ok(RelayStats {
            connections: registry.len(),
            channels: registry.channel_count(),
        })
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.registry().map(|r| r.contains(id)).unwrap_or(false)
    }

    pub fn is_subscribed(&self, id: ConnectionId, channel: &str) -> bool {
        self.registry()
            .map(|r| r.is_subscribed(id, channel))
            .unwrap_or(false)
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new(FanoutPolicy::default(), DEFAULT_OUTBOUND_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribed_connection_receives_bridge_event_exactly_once() {
        let relay = RelayState::default();
        let (c1, mut rx1) = relay.connect().unwrap();
        relay.subscribe(c1, "srv1-gen").unwrap();

        let body = json!({"type": "message", "channel": "srv1-gen", "message": {"id": "m1", "content": "hi"}});
        let event = Event::from_broadcast(body.clone()).unwrap();
        let delivery = relay.publish(&event).unwrap();

        assert_eq!(delivery.delivered, 1);
        let frame = rx1.try_recv().unwrap();
        assert_eq!(serde_json::from_str::<serde_json::Value>(&frame).unwrap(), body);
        assert!(rx1.try_recv().is_err());
    }

    #[test]
    fn closed_socket_is_absent_after_next_event() {
        let relay = RelayState::default();
        let (c1, rx1) = relay.connect().unwrap();
        relay.subscribe(c1, "x").unwrap();
        drop(rx1);

        let event = Event::from_broadcast(json!({"channel": "x", "message": "late"})).unwrap();
        let delivery = relay.publish(&event).unwrap();
        assert_eq!(delivery.pruned, 1);
        assert!(!relay.is_registered(c1));
    }

    #[test]
    fn disconnect_twice_is_harmless() {
        let relay = RelayState::default();
        let (c1, _rx1) = relay.connect().unwrap();
        relay.disconnect(c1);
        relay.disconnect(c1);
        assert_eq!(relay.stats().unwrap().connections, 0);
    }

    #[test]
    fn send_to_reaches_only_that_connection() {
        let relay = RelayState::default();
        let (c1, mut rx1) = relay.connect().unwrap();
        let (_c2, mut rx2) = relay.connect().unwrap();
        let outcome = relay.send_to(c1, &Frame::subscribe("srv1-gen")).unwrap();
        assert_eq!(outcome, SendOutcome::Queued);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[test]
    fn stats_count_distinct_channels() {
        let relay = RelayState::default();
        let (c1, _rx1) = relay.connect().unwrap();
        let (c2, _rx2) = relay.connect().unwrap();
        relay.subscribe(c1, "a").unwrap();
        relay.subscribe(c2, "a").unwrap();
        relay.subscribe(c2, "b").unwrap();
        assert_eq!(
            relay.stats().unwrap(),
            RelayStats {
                connections: 2,
                channels: 2
            }
        );
    }
}
