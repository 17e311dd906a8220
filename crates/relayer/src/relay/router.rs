//! Channel router: picks the target connections for an event and queues it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use shared::Event;

use super::registry::{ConnectionId, Registry, SendOutcome};

/// Which connections an event is delivered to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FanoutPolicy {
    /// Subscribers of `event.channel`; events without a channel go to everyone.
    #[default]
    Scoped,
    /// Every registered connection, subscriptions ignored.
    Global,
}

impl FromStr for FanoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scoped" => Ok(Self::Scoped),
            "global" => Ok(Self::Global),
            other => Err(format!("unknown fan-out policy `{}`", other)),
        }
    }
}

impl fmt::Display for FanoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scoped => "scoped",
            Self::Global => "global",
        })
    }
}

/// What happened to one routed event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Dropped because the connection's outbound queue was full.
    pub dropped: usize,
    /// Dead connections removed from the registry during this fan-out.
    pub pruned: usize,
}

fn select_targets(registry: &Registry, policy: FanoutPolicy, event: &Event) -> Vec<ConnectionId> {
    match (policy, event.channel.as_deref()) {
        (FanoutPolicy::Scoped, Some(channel)) => registry.connections_for(channel).collect(),
        _ => registry.all().collect(),
    }
}

/// Serialize `event` once and queue it on every target connection.
///
/// Closed connections are unregistered as they are found. A channel with no
/// subscribers is not an error: the event is simply dropped.
pub fn fan_out(registry: &mut Registry, policy: FanoutPolicy, event: &Event) -> Delivery {
    let targets = select_targets(registry, policy, event);
    let mut delivery = Delivery::default();
    if targets.is_empty() {
        return delivery;
    }

    let frame: Arc<str> = Arc::from(event.to_json());
    for id in targets {
        if !registry.is_open(id) {
            registry.unregister(id);
            delivery.pruned += 1;
            continue;
        }
        match registry.send(id, frame.clone()) {
            SendOutcome::Queued => delivery.delivered += 1,
            SendOutcome::Full => {
                tracing::warn!(
                    connection_id = %id,
                    kind = %event.kind,
                    "outbound queue full, dropping event for connection"
                );
                delivery.dropped += 1;
            }
            SendOutcome::Closed => {
                registry.unregister(id);
                delivery.pruned += 1;
            }
            SendOutcome::Unknown => {}
        }
    }
    delivery
}
