//! Broadcast gateway
//!
//! Turns hub snapshots into frames and fans them out through the
//! registry. All calls happen on the hub task, which gives a total order
//! of snapshots per hub; each snapshot is serialized once and the same
//! bytes go to every connection.

use keynes_core::{HubId, Snapshot};
use tracing::{debug, error};

use crate::frame::encode_snapshot;
use crate::registry::{ConnId, ConnectionRegistry};

/// Publish to every connection; returns connections that must be dropped
pub fn publish(hub: &HubId, registry: &ConnectionRegistry, snapshot: &Snapshot) -> Vec<ConnId> {
    let frame = match encode_snapshot(snapshot) {
        Ok(frame) => frame,
        Err(e) => {
            error!(hub = %hub, error = %e, "Failed to encode snapshot");
            return Vec::new();
        }
    };

    debug!(
        hub = %hub,
        kind = ?snapshot.kind,
        round = snapshot.round,
        recipients = registry.len(),
        "Broadcasting snapshot"
    );
    registry.broadcast(&frame)
}

/// Send to a single connection; returns it if it must be dropped
pub fn reply(
    hub: &HubId,
    registry: &ConnectionRegistry,
    conn: ConnId,
    snapshot: &Snapshot,
) -> Option<ConnId> {
    let frame = match encode_snapshot(snapshot) {
        Ok(frame) => frame,
        Err(e) => {
            error!(hub = %hub, error = %e, "Failed to encode snapshot");
            return None;
        }
    };

    match registry.send_to(conn, frame) {
        Ok(()) => None,
        Err(e) => {
            debug!(hub = %hub, conn = %conn, error = %e, "Reply failed");
            Some(conn)
        }
    }
}
