//! Connection registry
//!
//! Tracks which live connections exist and which nickname, if any, each one
//! is bound to. A nickname is held by at most one connection at a time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, trace};
use uuid::Uuid;

/// Opaque handle for a live duplex connection, minted by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
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
        self.0.fmt(f)
    }
}

/// A nickname bound to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientBinding {
    pub nickname: String,
    pub connection: ConnectionId,
}

/// Per-connection lifecycle state as seen by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unbound,
    Bound(String),
    /// Never opened, or already closed.
    Closed,
}

/// Outcome of binding a nickname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Nickname this connection held before, if it was already bound.
    pub replaced: Option<String>,
    /// Another connection that held the nickname and was unbound.
    pub evicted: Option<ConnectionId>,
}

/// Live connection table with a nickname index.
///
/// Not synchronized on its own; [`crate::Relay`] owns one behind a mutex.
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, Option<String>>,
    nicknames: HashMap<String, ConnectionId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection in the unbound state. Re-opening a known
    /// connection leaves its binding untouched.
    pub fn open(&mut self, conn: ConnectionId) {
        self.connections.entry(conn).or_insert(None);
    }

    /// Binds `nickname` to `conn`, returning `None` if the connection is not open.
    pub fn subscribe(&mut self, conn: ConnectionId, nickname: &str) -> Option<Subscription> {
        let slot = self.connections.get_mut(&conn)?;
        let replaced = slot.replace(nickname.to_string());

        if let Some(old) = &replaced {
            if self.nicknames.get(old) == Some(&conn) {
                self.nicknames.remove(old);
            }
        }

        let evicted = self
            .nicknames
            .insert(nickname.to_string(), conn)
            .filter(|holder| *holder != conn);

        if let Some(holder) = evicted {
            if let Some(binding) = self.connections.get_mut(&holder) {
                *binding = None;
            }
            debug!(conn = %holder, nickname, "nickname taken over, previous holder unbound");
        }

        trace!(%conn, nickname, ?replaced, "bound nickname");
        Some(Subscription { replaced, evicted })
    }

    /// Forgets a connection. Returns the nickname it was bound to.
    pub fn close(&mut self, conn: ConnectionId) -> Option<String> {
        let nickname = self.connections.remove(&conn).flatten()?;
        if self.nicknames.get(&nickname) == Some(&conn) {
            self.nicknames.remove(&nickname);
        }
        Some(nickname)
    }

    pub fn state(&self, conn: ConnectionId) -> ConnectionState {
        match self.connections.get(&conn) {
            None => ConnectionState::Closed,
            Some(None) => ConnectionState::Unbound,
            Some(Some(nickname)) => ConnectionState::Bound(nickname.clone()),
        }
    }

    pub fn binding(&self, conn: ConnectionId) -> Option<ClientBinding> {
        let nickname = self.connections.get(&conn)?.as_ref()?;
        Some(ClientBinding {
            nickname: nickname.clone(),
            connection: conn,
        })
    }

    /// Connection currently holding `nickname`.
    pub fn lookup(&self, nickname: &str) -> Option<ConnectionId> {
        self.nicknames.get(nickname).copied()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn bound_count(&self) -> usize {
        self.nicknames.len()
    }
}
