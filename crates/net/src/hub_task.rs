//! Per-hub task
//!
//! Every hub runs as one tokio task that owns its [`Hub`] state machine,
//! its [`ConnectionRegistry`] and its single pending timer. Joins, leaves,
//! submissions and timer expiries are handled one at a time in the task's
//! select loop, so a deadline and a last-moment submission can never
//! interleave. Hubs share nothing and run in parallel.

use std::collections::VecDeque;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use keynes_core::{Effect, GameRules, Hub, HubId, JoinKind, Phase, Snapshot, Timer};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Sleep};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::frame::decode_submission;
use crate::gateway;
use crate::registry::{ConnId, ConnectionRegistry, Outbox};

/// Capacity of a hub's command queue
const COMMAND_CAPACITY: usize = 256;

/// Commands accepted by a hub task
#[derive(Debug)]
pub enum Command {
    Join {
        name: String,
        tx: Outbox,
        reply: oneshot::Sender<Result<Session>>,
    },
    Leave {
        conn: ConnId,
    },
    Submit {
        conn: ConnId,
        payload: String,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Shutdown,
}

/// A joined connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub conn: ConnId,
    /// Normalized player name
    pub name: String,
    pub kind: JoinKind,
}

/// Cheap view of a hub for the directory's housekeeping
#[derive(Debug, Clone)]
pub struct HubStatus {
    pub phase: Phase,
    pub connections: usize,
    pub players: usize,
    pub created_at: DateTime<Utc>,
    /// Last command handled
    pub last_activity: Instant,
    /// The task has stopped
    pub closed: bool,
}

/// Handle to a running hub task
#[derive(Debug, Clone)]
pub struct HubHandle {
    id: HubId,
    tx: mpsc::Sender<Command>,
    status: watch::Receiver<HubStatus>,
}

impl HubHandle {
    pub fn id(&self) -> &HubId {
        &self.id
    }

    /// Latest published status
    pub fn status(&self) -> HubStatus {
        self.status.borrow().clone()
    }

    async fn send(&self, cmd: Command) -> Result<()> {
        self.tx.send(cmd).await.map_err(|_| Error::HubClosed)
    }

    /// Join under `name`; frames for this connection are queued on `tx`
    pub async fn join(&self, name: &str, tx: Outbox) -> Result<Session> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Join {
            name: name.to_string(),
            tx,
            reply,
        })
        .await?;
        rx.await.map_err(|_| Error::HubClosed)?
    }

    pub async fn leave(&self, conn: ConnId) -> Result<()> {
        self.send(Command::Leave { conn }).await
    }

    /// Forward a raw inbound frame. Invalid frames are dropped by the hub.
    pub async fn submit(&self, conn: ConnId, payload: String) -> Result<()> {
        self.send(Command::Submit { conn, payload }).await
    }

    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| Error::HubClosed)
    }

    /// Stop the task and close its connections
    pub fn shutdown(&self) {
        if self.tx.try_send(Command::Shutdown).is_err() {
            debug!(hub = %self.id, "Hub already stopped or busy");
        }
    }
}

/// Start a hub task
pub fn spawn_hub(id: HubId, rules: GameRules) -> HubHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    let hub = Hub::new(id.clone(), rules);
    let (status_tx, status) = watch::channel(HubStatus {
        phase: hub.phase(),
        connections: 0,
        players: 0,
        created_at: hub.created_at(),
        last_activity: Instant::now(),
        closed: false,
    });

    let task = HubTask {
        hub,
        registry: ConnectionRegistry::new(),
        timer: None,
        status_tx,
        last_activity: Instant::now(),
    };
    tokio::spawn(task.run(rx));

    HubHandle { id, tx, status }
}

struct PendingTimer {
    timer: Timer,
    sleep: Pin<Box<Sleep>>,
}

struct HubTask {
    hub: Hub,
    registry: ConnectionRegistry,
    timer: Option<PendingTimer>,
    status_tx: watch::Sender<HubStatus>,
    last_activity: Instant,
}

/// Resolve when the pending timer expires
async fn expired(timer: &mut Option<PendingTimer>) -> Timer {
    match timer {
        Some(pending) => {
            pending.sleep.as_mut().await;
            pending.timer
        }
        None => std::future::pending().await,
    }
}

impl HubTask {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!(hub = %self.hub.id(), "Hub started");

        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    let Some(cmd) = cmd else {
                        debug!(hub = %self.hub.id(), "All handles dropped");
                        break;
                    };
                    self.last_activity = Instant::now();
                    if !self.handle(cmd) {
                        break;
                    }
                }
                timer = expired(&mut self.timer), if self.timer.is_some() => {
                    self.timer = None;
                    let effects = self.hub.timer_fired(timer);
                    self.apply(effects, None);
                }
            }
            self.publish_status(false);
        }

        self.registry.close_all();
        self.publish_status(true);
        info!(hub = %self.hub.id(), "Hub stopped");
    }

    /// Returns false when the task should stop
    fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Join { name, tx, reply } => {
                let result = match self.hub.join(&name) {
                    Ok(joined) => {
                        let conn = self.registry.register(joined.name.clone(), tx);
                        info!(
                            hub = %self.hub.id(),
                            conn = %conn,
                            player = %joined.name,
                            kind = ?joined.kind,
                            "Connection joined"
                        );
                        self.apply(joined.effects, Some(conn));
                        Ok(Session {
                            conn,
                            name: joined.name,
                            kind: joined.kind,
                        })
                    }
                    Err(e) => {
                        debug!(hub = %self.hub.id(), name = %name, error = %e, "Join rejected");
                        Err(e.into())
                    }
                };
                // The requester went away; release what was registered for it
                if let Err(Ok(session)) = reply.send(result) {
                    debug!(hub = %self.hub.id(), conn = %session.conn, "Join abandoned");
                    self.drop_connection(session.conn);
                }
            }
            Command::Leave { conn } => {
                self.drop_connection(conn);
            }
            Command::Submit { conn, payload } => {
                self.submit(conn, &payload);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.hub.snapshot());
            }
            Command::Shutdown => {
                info!(hub = %self.hub.id(), "Hub shutting down");
                return false;
            }
        }
        true
    }

    fn submit(&mut self, conn: ConnId, payload: &str) {
        let Some(name) = self.registry.player_of(conn).map(str::to_string) else {
            debug!(hub = %self.hub.id(), conn = %conn, "Submission from unknown connection");
            return;
        };

        let value = match decode_submission(payload) {
            Ok(value) => value,
            Err(e) => {
                debug!(hub = %self.hub.id(), player = %name, error = %e, "Ignoring frame");
                return;
            }
        };

        match self.hub.submit(&name, value) {
            Ok(effects) => self.apply(effects, Some(conn)),
            Err(e) => {
                debug!(hub = %self.hub.id(), player = %name, error = %e, "Submission rejected");
            }
        }
    }

    fn drop_connection(&mut self, conn: ConnId) {
        let Some(name) = self.registry.unregister(conn) else {
            return;
        };
        debug!(hub = %self.hub.id(), conn = %conn, player = %name, "Connection left");
        let effects = self.hub.leave(&name);
        self.apply(effects, None);
    }

    /// Carry out effects in order. Connections that fail a send are
    /// dropped, and the effects of dropping them are applied in turn.
    fn apply(&mut self, effects: Vec<Effect>, origin: Option<ConnId>) {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut failed: Vec<ConnId> = Vec::new();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Broadcast(snapshot) => {
                    failed.extend(gateway::publish(self.hub.id(), &self.registry, &snapshot));
                }
                Effect::Reply(snapshot) => {
                    if let Some(conn) = origin {
                        failed.extend(gateway::reply(self.hub.id(), &self.registry, conn, &snapshot));
                    }
                }
                Effect::Schedule { timer, after } => {
                    self.timer = Some(PendingTimer {
                        timer,
                        sleep: Box::pin(tokio::time::sleep(after)),
                    });
                }
            }

            if queue.is_empty() {
                for conn in failed.drain(..) {
                    let Some(name) = self.registry.unregister(conn) else {
                        continue;
                    };
                    warn!(hub = %self.hub.id(), conn = %conn, player = %name, "Dropping unreachable connection");
                    queue.extend(self.hub.leave(&name));
                }
            }
        }

        if self.hub.is_finished() {
            self.timer = None;
        }
    }

    fn publish_status(&self, closed: bool) {
        self.status_tx.send_replace(HubStatus {
            phase: self.hub.phase(),
            connections: self.registry.len(),
            players: self.hub.players().len(),
            created_at: self.hub.created_at(),
            last_activity: self.last_activity,
            closed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Outbound;
    use crate::registry::outbox;
    use keynes_core::SnapshotKind;

    async fn next_snapshot(rx: &mut mpsc::Receiver<Outbound>) -> Snapshot {
        match rx.recv().await {
            Some(Outbound::Text(text)) => Snapshot::from_json(&text).unwrap(),
            other => panic!("expected snapshot, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_broadcasts_roster() {
        let handle = spawn_hub(HubId::generate(), GameRules::default());
        let (tx_a, mut rx_a) = outbox();
        let (tx_b, mut rx_b) = outbox();

        let a = handle.join("alice", tx_a).await.unwrap();
        assert_eq!(a.kind, JoinKind::New);
        assert_eq!(next_snapshot(&mut rx_a).await.players.len(), 1);

        handle.join("bob", tx_b).await.unwrap();
        assert_eq!(next_snapshot(&mut rx_a).await.players.len(), 2);
        assert_eq!(next_snapshot(&mut rx_b).await.players.len(), 2);

        // Status is published once the command is done
        handle.snapshot().await.unwrap();
        assert_eq!(handle.status().connections, 2);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let handle = spawn_hub(HubId::generate(), GameRules::default());
        let (tx, _rx) = outbox();
        let err = handle.join("  ", tx).await.unwrap_err();
        assert!(matches!(err, Error::Core(keynes_core::Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_shutdown_closes_connections() {
        let handle = spawn_hub(HubId::generate(), GameRules::default());
        let (tx, mut rx) = outbox();
        handle.join("alice", tx).await.unwrap();
        next_snapshot(&mut rx).await;

        handle.shutdown();
        assert_eq!(rx.recv().await, Some(Outbound::Close));
        assert!(matches!(handle.snapshot().await, Err(Error::HubClosed)));
    }

    #[tokio::test]
    async fn test_failed_send_drops_connection() {
        let handle = spawn_hub(HubId::generate(), GameRules::default());
        let (tx_a, mut rx_a) = outbox();
        let (tx_b, rx_b) = outbox();
        let (tx_c, _rx_c) = outbox();

        handle.join("alice", tx_a).await.unwrap();
        handle.join("bob", tx_b).await.unwrap();
        drop(rx_b);

        // Carol's roster broadcast cannot reach bob
        handle.join("carol", tx_c).await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        let names: Vec<_> = snapshot.players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol"]);
        assert_eq!(handle.status().connections, 2);

        // Alice is unaffected and sees the roster without bob
        assert_eq!(next_snapshot(&mut rx_a).await.players.len(), 1);
        assert_eq!(next_snapshot(&mut rx_a).await.players.len(), 2);
        assert_eq!(next_snapshot(&mut rx_a).await.players.len(), 3);
        let after = next_snapshot(&mut rx_a).await;
        assert_eq!(after.kind, SnapshotKind::State);
        assert!(after.player("bob").is_none());
    }

    #[tokio::test]
    async fn test_abandoned_join_released() {
        let handle = spawn_hub(HubId::generate(), GameRules::default());
        let (tx, _rx) = outbox();
        let (reply, reply_rx) = oneshot::channel();
        drop(reply_rx);

        handle
            .tx
            .send(Command::Join {
                name: "alice".into(),
                tx,
                reply,
            })
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        assert!(snapshot.players.is_empty());
        assert_eq!(handle.status().connections, 0);
    }

    #[tokio::test]
    async fn test_snapshot_query() {
        let handle = spawn_hub(HubId::generate(), GameRules::default());
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.kind, SnapshotKind::State);
        assert!(snapshot.players.is_empty());
    }
}
