//! Connection registry: live sockets and the channels each one subscribed to.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Opaque handle for one accepted socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn_{}", self.0.simple())
    }
}

/// Serialized frame queued for a connection's writer task.
pub type Outbound = Arc<str>;

/// Outcome of queueing a frame on one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Writer is behind; this frame was dropped for this connection only.
    Full,
    /// Writer is gone; the connection should be pruned.
    Closed,
    Unknown,
}

struct Connection {
    tx: mpsc::Sender<Outbound>,
    channels: HashSet<String>,
}

impl Connection {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// All registered connections. Plain data; [`super::RelayState`] puts it
/// behind the lock so every mutation and fan-out is serialized.
#[derive(Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection with an empty subscription set.
    pub fn register(&mut self, id: ConnectionId, tx: mpsc::Sender<Outbound>) {
        self.connections.insert(
            id,
            Connection {
                tx,
                channels: HashSet::new(),
            },
        );
    }

    /// Returns `true` if the channel was newly added. Unknown ids are ignored.
    pub fn subscribe(&mut self, id: ConnectionId, channel: &str) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) => conn.channels.insert(channel.to_string()),
            None => false,
        }
    }

    /// Idempotent; returns whether anything was removed.
    pub fn unregister(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn is_subscribed(&self, id: ConnectionId, channel: &str) -> bool {
        self.connections
            .get(&id)
            .is_some_and(|c| c.channels.contains(channel))
    }

    /// Connections currently subscribed to `channel`.
    pub fn connections_for<'a>(
        &'a self,
        channel: &'a str,
    ) -> impl Iterator<Item = ConnectionId> + 'a {
        self.connections
            .iter()
            .filter(move |(_, c)| c.channels.contains(channel))
            .map(|(id, _)| *id)
    }

    /// Every registered connection, subscribed or not.
    pub fn all(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.connections.keys().copied()
    }

    pub fn is_open(&self, id: ConnectionId) -> bool {
        self.connections.get(&id).is_some_and(Connection::is_open)
    }

    /// Queue a frame without waiting on the writer.
    pub fn send(&self, id: ConnectionId, frame: Outbound) -> SendOutcome {
        let Some(conn) = self.connections.get(&id) else {
            return SendOutcome::Unknown;
        };
        match conn.tx.try_send(frame) {
            Ok(()) => SendOutcome::Queued,
            Err(TrySendError::Full(_)) => SendOutcome::Full,
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of distinct channel names held by at least one connection.
    pub fn channel_count(&self) -> usize {
        self.connections
            .values()
            .flat_map(|c| c.channels.iter())
            .collect::<HashSet<_>>()
            .len()
    }
}
