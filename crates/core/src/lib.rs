//! Keynes Core Library
//!
//! Game engine for a "guess 4/5 of the average" elimination game: players,
//! rounds, the target rule, the per-hub state machine and the snapshots it
//! publishes. Nothing here performs I/O; the runtime lives in `keynes-net`.

pub mod config;
pub mod error;
pub mod hub;
pub mod invariants;
pub mod models;
pub mod round;
pub mod snapshot;

pub use config::{Config, DirectoryConfig, GameRules, ServerConfig, TargetRatio};
pub use error::{Error, Result};
pub use hub::{Effect, Hub, JoinKind, Joined, Phase, Timer};
pub use models::*;
pub use round::{compute_target, parse_submission, score_round, Round, RoundOutcome, MAX_RESPONSE};
pub use snapshot::{PlayerView, Snapshot, SnapshotKind, SNAPSHOT_VERSION};
