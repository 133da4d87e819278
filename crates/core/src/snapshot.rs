//! Wire snapshot of a hub
//!
//! Every state change is published to clients as one complete snapshot.
//! Optional fields are omitted rather than sent as `null`, and `players`
//! is always in join order, so an unchanged hub serializes to identical
//! bytes.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Schema version carried in every snapshot
pub const SNAPSHOT_VERSION: u32 = 1;

/// Why the snapshot was sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Roster or submission progress changed
    State,
    /// A round just closed
    Result,
    /// The game is finished; this snapshot no longer changes
    GameOver,
}

/// One player as seen by every client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub name: String,
    pub score: u32,
    pub eliminated: bool,
    /// Whether the player has submitted in the current round
    pub submitted: bool,
    /// Only revealed once the round is closed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    /// Latest round number, 0 before the first round
    pub round: u32,
    pub players: Vec<PlayerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winners: Option<Vec<String>>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn player(&self, name: &str) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.name == name)
    }
}
