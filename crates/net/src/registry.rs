//! Connection registry
//!
//! Tracks the live connections of one hub and the player each one is bound
//! to. Owned by the hub task, so it needs no locking. Sends never wait: a
//! connection whose queue is full or closed is reported back as failed and
//! the caller drops it.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::Outbound;

/// Identifier of one transport connection
pub type ConnId = Uuid;

/// Queue feeding a connection's writer task
pub type Outbox = mpsc::Sender<Outbound>;

/// Capacity of each connection's outbound queue
pub const OUTBOX_CAPACITY: usize = 64;

/// Create the queue for a new connection
pub fn outbox() -> (Outbox, mpsc::Receiver<Outbound>) {
    mpsc::channel(OUTBOX_CAPACITY)
}

struct Connection {
    player: String,
    tx: Outbox,
}

/// Live connections of one hub
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a connection to a player and return its id
    pub fn register(&mut self, player: String, tx: Outbox) -> ConnId {
        let conn = Uuid::new_v4();
        self.connections.insert(conn, Connection { player, tx });
        conn
    }

    /// Forget a connection; returns the player it was bound to
    pub fn unregister(&mut self, conn: ConnId) -> Option<String> {
        self.connections.remove(&conn).map(|c| c.player)
    }

    pub fn player_of(&self, conn: ConnId) -> Option<&str> {
        self.connections.get(&conn).map(|c| c.player.as_str())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Queue a frame for one connection
    pub fn send_to(&self, conn: ConnId, frame: Outbound) -> Result<()> {
        let connection = self
            .connections
            .get(&conn)
            .ok_or_else(|| Error::TransportFailure(format!("unknown connection {}", conn)))?;

        connection.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => Error::TransportFailure(format!("connection {} is backed up", conn)),
            TrySendError::Closed(_) => Error::TransportFailure(format!("connection {} is closed", conn)),
        })
    }

    /// Queue a frame for every connection; returns the ones that failed
    pub fn broadcast(&self, frame: &Outbound) -> Vec<ConnId> {
        let mut failed = Vec::new();
        for (conn, connection) in &self.connections {
            if let Err(e) = connection.tx.try_send(frame.clone()) {
                debug!(conn = %conn, player = %connection.player, error = %e, "Failed to queue frame");
                failed.push(*conn);
            }
        }
        failed
    }

    /// Ask every writer to close and forget all connections
    pub fn close_all(&mut self) {
        for (_, connection) in self.connections.drain() {
            let _ = connection.tx.try_send(Outbound::Close);
        }
    }
}
