//! Hub state machine
//!
//! A hub owns one game: the roster, the open round, and the outcome of the
//! last closed round. It performs no I/O and reads no clock. Every
//! transition returns the [`Effect`]s the runtime must carry out, in order:
//! snapshots to publish and timers to arm.
//!
//! ```text
//! Lobby ──first submission (≥2 active)──▶ RoundOpen(1)
//! Lobby ──first submission (1 active)──▶ GameOver
//! RoundOpen(n) ──all submitted | deadline──▶ [scoring]
//! [scoring] ──≥2 active──▶ Intermission(n+1) ──timer──▶ RoundOpen(n+1)
//! [scoring] ──<2 active | stalemate──▶ GameOver
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::GameRules;
use crate::error::{Error, Result};
use crate::invariants::{assert_hub_invariants, assert_outcome_invariants};
use crate::models::{normalize_name, HubId, Player};
use crate::round::{score_round, Round, RoundOutcome};
use crate::snapshot::{PlayerView, Snapshot, SnapshotKind, SNAPSHOT_VERSION};

/// Lifecycle phase of a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Accepting new players, no round played yet
    Lobby,
    /// A round is collecting submissions
    RoundOpen,
    /// Showing a result; the given round opens when the pause ends
    Intermission { next_round: u32 },
    /// Terminal
    GameOver,
}

impl Phase {
    pub fn has_started(self) -> bool {
        self != Phase::Lobby
    }
}

/// Timers a hub asks the runtime to arm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    /// Submission window of a round ends
    Deadline { round: u32 },
    /// Intermission ends and the round opens
    NextRound { round: u32 },
}

/// Side effect requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Publish to every connection of the hub
    Broadcast(Snapshot),
    /// Publish to the connection that caused the transition only
    Reply(Snapshot),
    /// Arm a timer, replacing any armed one
    Schedule { timer: Timer, after: Duration },
}

/// Whether a join created a player or bound to an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    New,
    Reconnect,
}

/// Result of a successful join
#[derive(Debug, Clone, PartialEq)]
pub struct Joined {
    /// Normalized player name
    pub name: String,
    pub kind: JoinKind,
    pub effects: Vec<Effect>,
}

/// Authoritative state of one game
#[derive(Debug, Clone)]
pub struct Hub {
    id: HubId,
    rules: GameRules,
    created_at: DateTime<Utc>,
    /// Join order
    players: Vec<Player>,
    phase: Phase,
    round_number: u32,
    /// Open round, or the last closed one
    round: Option<Round>,
    last_outcome: Option<RoundOutcome>,
    stalled_rounds: u32,
    final_snapshot: Option<Snapshot>,
}

impl Hub {
    pub fn new(id: HubId, rules: GameRules) -> Self {
        Self {
            id,
            rules,
            created_at: Utc::now(),
            players: Vec::new(),
            phase: Phase::Lobby,
            round_number: 0,
            round: None,
            last_outcome: None,
            stalled_rounds: 0,
            final_snapshot: None,
        }
    }

    pub fn id(&self) -> &HubId {
        &self.id
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn stalled_rounds(&self) -> u32 {
        self.stalled_rounds
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    /// Active player names in join order
    pub fn active_names(&self) -> Vec<&str> {
        self.players
            .iter()
            .filter(|p| p.is_active())
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_active()).count()
    }

    /// Live connections across all players
    pub fn connection_count(&self) -> usize {
        self.players.iter().map(|p| p.connections).sum()
    }

    pub fn last_outcome(&self) -> Option<&RoundOutcome> {
        self.last_outcome.as_ref()
    }

    fn open_round(&self) -> Option<&Round> {
        self.round.as_ref().filter(|r| r.is_open())
    }

    /// Bind a new connection under `raw_name`.
    ///
    /// A known name reconnects to its player whatever the phase. A new name
    /// is only admitted in the lobby, and only while there is room.
    pub fn join(&mut self, raw_name: &str) -> Result<Joined> {
        let name = normalize_name(raw_name)?;

        let kind = match self.player_mut(&name) {
            Some(player) => {
                player.connections += 1;
                JoinKind::Reconnect
            }
            None => {
                if self.phase.has_started() {
                    return Err(Error::InvalidInput(format!(
                        "game already in progress, '{}' is not a player",
                        name
                    )));
                }
                if self.players.len() >= self.rules.max_players {
                    return Err(Error::HubFull(self.rules.max_players));
                }
                let mut player = Player::new(name.clone(), self.rules.lives);
                player.connections = 1;
                self.players.push(player);
                JoinKind::New
            }
        };

        tracing::debug!(hub = %self.id, player = %name, ?kind, "Player joined");

        let effects = match self.phase {
            Phase::GameOver => vec![Effect::Reply(self.snapshot())],
            _ => vec![Effect::Broadcast(self.snapshot())],
        };

        assert_hub_invariants(self);
        Ok(Joined {
            name,
            kind,
            effects,
        })
    }

    /// Unbind one connection of `name`.
    ///
    /// A player left without connections before the game starts is removed
    /// from the roster; afterwards players are kept for the leaderboard and
    /// for reconnection.
    pub fn leave(&mut self, name: &str) -> Vec<Effect> {
        let phase = self.phase;
        let Some(player) = self.player_mut(name) else {
            return Vec::new();
        };
        player.connections = player.connections.saturating_sub(1);

        if !player.is_connected() && !phase.has_started() {
            self.players.retain(|p| p.name != name);
            tracing::debug!(hub = %self.id, player = %name, "Player removed from lobby");
        }

        assert_hub_invariants(self);
        match self.phase {
            Phase::GameOver => Vec::new(),
            _ => vec![Effect::Broadcast(self.snapshot())],
        }
    }

    /// Record a number from `name`.
    ///
    /// Rejections leave the hub untouched: unknown or eliminated players,
    /// values over 100, and any submission outside an open round. The first
    /// number in the lobby opens round 1, or ends the game at once when its
    /// sender is the only active player.
    pub fn submit(&mut self, name: &str, value: u8) -> Result<Vec<Effect>> {
        let player = self
            .player(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown player '{}'", name)))?;
        if player.eliminated {
            return Err(Error::InvalidInput(format!("'{}' is eliminated", name)));
        }
        if value > crate::round::MAX_RESPONSE {
            return Err(Error::InvalidInput(format!("out of range: {}", value)));
        }

        let mut effects = Vec::new();
        match self.phase {
            Phase::Lobby => {
                effects.extend(self.start_round(1));
                // A lone player wins without a round being played
                if self.phase == Phase::GameOver {
                    assert_hub_invariants(self);
                    return Ok(effects);
                }
            }
            Phase::RoundOpen => {}
            Phase::Intermission { .. } | Phase::GameOver => {
                return Err(Error::InvalidTransition(format!(
                    "no round open in phase {:?}",
                    self.phase
                )));
            }
        }

        match self.round.as_mut() {
            Some(round) if round.is_open() => round.submit(name, value)?,
            _ => return Err(Error::InvalidTransition("no open round".into())),
        }

        tracing::debug!(hub = %self.id, round = self.round_number, player = %name, "Submission accepted");

        if self.all_submitted() {
            effects.extend(self.close_round());
        } else {
            effects.push(Effect::Broadcast(self.snapshot()));
        }

        assert_hub_invariants(self);
        Ok(effects)
    }

    /// Handle an expired timer. Timers for another round are ignored.
    pub fn timer_fired(&mut self, timer: Timer) -> Vec<Effect> {
        let effects = match (timer, self.phase) {
            (Timer::Deadline { round }, Phase::RoundOpen) if round == self.round_number => {
                tracing::debug!(hub = %self.id, round, "Round deadline elapsed");
                self.close_round()
            }
            (Timer::NextRound { round }, Phase::Intermission { next_round })
                if round == next_round =>
            {
                let mut effects = self.start_round(round);
                if self.phase == Phase::RoundOpen {
                    effects.push(Effect::Broadcast(self.snapshot()));
                }
                effects
            }
            _ => {
                tracing::debug!(hub = %self.id, ?timer, phase = ?self.phase, "Ignoring stale timer");
                Vec::new()
            }
        };

        assert_hub_invariants(self);
        effects
    }

    fn all_submitted(&self) -> bool {
        let Some(round) = self.open_round() else {
            return false;
        };
        self.players
            .iter()
            .filter(|p| p.is_active())
            .all(|p| round.has_submitted(&p.name))
    }

    /// Open round `number`, or end the game if it cannot be played
    fn start_round(&mut self, number: u32) -> Vec<Effect> {
        if self.active_count() < 2 {
            return self.finish();
        }

        self.round_number = number;
        self.round = Some(Round::open(number));
        self.phase = Phase::RoundOpen;

        tracing::info!(hub = %self.id, round = number, players = self.active_count(), "Round opened");

        vec![Effect::Schedule {
            timer: Timer::Deadline { round: number },
            after: self.rules.round_duration(),
        }]
    }

    /// Close the open round, apply its outcome, and move on
    fn close_round(&mut self) -> Vec<Effect> {
        let Some(open) = self.round.as_mut() else {
            return Vec::new();
        };
        if let Err(e) = open.close() {
            tracing::warn!(hub = %self.id, error = %e, "Round already closed");
            return Vec::new();
        }
        let round = open.clone();

        let outcome = {
            let active = self.active_names();
            score_round(&round, self.rules.target_ratio, &active)
        };
        assert_outcome_invariants(&outcome, &round);

        let mut eliminated = Vec::new();
        let win_points = self.rules.win_points;
        for player in self.players.iter_mut().filter(|p| p.is_active()) {
            if outcome.is_winner(&player.name) {
                player.score += win_points;
                continue;
            }

            let abandoned = !round.has_submitted(&player.name) && !player.is_connected();
            if abandoned && player.forfeit() {
                eliminated.push(player.name.clone());
            } else if outcome.losers.contains(&player.name) && player.lose_life() {
                eliminated.push(player.name.clone());
            }
        }

        if eliminated.is_empty() {
            self.stalled_rounds += 1;
        } else {
            self.stalled_rounds = 0;
        }

        tracing::info!(
            hub = %self.id,
            round = outcome.round,
            target = ?outcome.target,
            winners = ?outcome.winners,
            eliminated = ?eliminated,
            "Round closed"
        );

        self.last_outcome = Some(outcome);
        let mut effects = vec![Effect::Broadcast(self.result_snapshot(SnapshotKind::Result))];

        if self.active_count() < 2 || self.stalled_rounds >= self.rules.stall_limit {
            effects.extend(self.finish());
            return effects;
        }

        let next_round = self.round_number + 1;
        self.phase = Phase::Intermission { next_round };
        if self.rules.intermission().is_zero() {
            effects.extend(self.start_round(next_round));
            if self.phase == Phase::RoundOpen {
                effects.push(Effect::Broadcast(self.snapshot()));
            }
        } else {
            effects.push(Effect::Schedule {
                timer: Timer::NextRound { round: next_round },
                after: self.rules.intermission(),
            });
        }
        effects
    }

    /// Enter `GameOver` and freeze the final snapshot
    fn finish(&mut self) -> Vec<Effect> {
        if let Some(round) = self.round.as_mut() {
            if round.is_open() {
                let _ = round.close();
            }
        }
        self.phase = Phase::GameOver;

        let snapshot = self.result_snapshot(SnapshotKind::GameOver);
        tracing::info!(
            hub = %self.id,
            rounds = self.round_number,
            winners = ?snapshot.winners,
            stalemate = self.stalled_rounds >= self.rules.stall_limit,
            "Game over"
        );
        self.final_snapshot = Some(snapshot.clone());
        vec![Effect::Broadcast(snapshot)]
    }

    /// Overall winners of a finished game.
    ///
    /// The last active player if only one is left; otherwise the highest
    /// scores among the active players (or everyone when nobody is active).
    pub fn champions(&self) -> Vec<String> {
        let active: Vec<&Player> = self.players.iter().filter(|p| p.is_active()).collect();
        if active.len() == 1 {
            return vec![active[0].name.clone()];
        }

        let pool: Vec<&Player> = if active.is_empty() {
            self.players.iter().collect()
        } else {
            active
        };
        let Some(best) = pool.iter().map(|p| p.score).max() else {
            return Vec::new();
        };
        pool.iter()
            .filter(|p| p.score == best)
            .map(|p| p.name.clone())
            .collect()
    }

    /// Snapshot of the hub as it stands.
    ///
    /// In a lobby or open round this is a `state` snapshot with responses
    /// hidden; during an intermission it repeats the last result; once the
    /// game is over it is the frozen final snapshot.
    pub fn snapshot(&self) -> Snapshot {
        match self.phase {
            Phase::GameOver => self
                .final_snapshot
                .clone()
                .unwrap_or_else(|| self.result_snapshot(SnapshotKind::GameOver)),
            Phase::Intermission { .. } => self.result_snapshot(SnapshotKind::Result),
            Phase::Lobby | Phase::RoundOpen => {
                let round = self.open_round();
                Snapshot {
                    version: SNAPSHOT_VERSION,
                    kind: SnapshotKind::State,
                    round: self.round_number,
                    players: self
                        .players
                        .iter()
                        .map(|p| PlayerView {
                            name: p.name.clone(),
                            score: p.score,
                            eliminated: p.eliminated,
                            submitted: round.is_some_and(|r| r.has_submitted(&p.name)),
                            response: None,
                        })
                        .collect(),
                    target: None,
                    average: None,
                    winners: None,
                }
            }
        }
    }

    /// Snapshot revealing the responses of the last closed round
    fn result_snapshot(&self, kind: SnapshotKind) -> Snapshot {
        let closed = self.round.as_ref().filter(|r| !r.is_open());
        let outcome = self.last_outcome.as_ref();

        let winners = match kind {
            SnapshotKind::GameOver => Some(self.champions()),
            _ => outcome.map(|o| o.winners.clone()),
        };

        Snapshot {
            version: SNAPSHOT_VERSION,
            kind,
            round: self.round_number,
            players: self
                .players
                .iter()
                .map(|p| {
                    let response = closed.and_then(|r| r.response(&p.name));
                    PlayerView {
                        name: p.name.clone(),
                        score: p.score,
                        eliminated: p.eliminated,
                        submitted: response.is_some(),
                        response,
                    }
                })
                .collect(),
            target: outcome.and_then(|o| o.target),
            average: outcome.and_then(|o| o.average),
            winners,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetRatio;

    fn rules() -> GameRules {
        GameRules {
            round_duration_secs: 30,
            intermission_secs: 5,
            max_players: 7,
            lives: 3,
            win_points: 1,
            stall_limit: 5,
            target_ratio: TargetRatio::new(4, 5),
        }
    }

    fn hub_with(rules: GameRules, names: &[&str]) -> Hub {
        let mut hub = Hub::new(HubId::generate(), rules);
        for name in names {
            hub.join(name).unwrap();
        }
        hub
    }

    fn broadcasts(effects: &[Effect]) -> Vec<&Snapshot> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Broadcast(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_roster_keeps_join_order() {
        let hub = hub_with(rules(), &["carol", "alice", "bob"]);
        let names: Vec<_> = hub.snapshot().players.into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["carol", "alice", "bob"]);
        assert_eq!(hub.active_names(), vec!["carol", "alice", "bob"]);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut hub = hub_with(rules(), &[]);
        assert!(matches!(hub.join("   "), Err(Error::InvalidInput(_))));
        assert!(hub.players().is_empty());
    }

    #[test]
    fn test_same_name_reconnects() {
        let mut hub = hub_with(rules(), &["alice"]);
        let joined = hub.join(" alice ").unwrap();
        assert_eq!(joined.kind, JoinKind::Reconnect);
        assert_eq!(hub.players().len(), 1);
        assert_eq!(hub.player("alice").unwrap().connections, 2);
    }

    #[test]
    fn test_lobby_full() {
        let mut r = rules();
        r.max_players = 2;
        let mut hub = hub_with(r, &["a", "b"]);
        assert!(matches!(hub.join("c"), Err(Error::HubFull(2))));
        // Reconnecting is still allowed
        assert!(hub.join("a").is_ok());
    }

    #[test]
    fn test_lobby_leave_removes_player() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.leave("a");
        assert!(hub.player("a").is_none());
        assert_eq!(hub.active_names(), vec!["b"]);
    }

    #[test]
    fn test_leave_after_start_keeps_player() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.submit("a", 10).unwrap();
        hub.leave("b");
        let b = hub.player("b").unwrap();
        assert!(!b.is_connected());
        assert!(b.is_active());
    }

    #[test]
    fn test_solo_submission_ends_game() {
        let mut hub = hub_with(rules(), &["a"]);
        let effects = hub.submit("a", 50).unwrap();

        assert_eq!(hub.phase(), Phase::GameOver);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Schedule { .. })));

        let over = broadcasts(&effects);
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].kind, SnapshotKind::GameOver);
        assert_eq!(over[0].winners, Some(vec!["a".to_string()]));
        assert_eq!(hub.champions(), vec!["a".to_string()]);

        // Nothing more happens once it is over
        assert!(hub.submit("a", 10).is_err());
        assert_eq!(hub.snapshot(), *over[0]);
    }

    #[test]
    fn test_first_submission_opens_round() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        let effects = hub.submit("a", 50).unwrap();

        assert_eq!(hub.phase(), Phase::RoundOpen);
        assert_eq!(hub.round_number(), 1);
        assert!(effects.contains(&Effect::Schedule {
            timer: Timer::Deadline { round: 1 },
            after: Duration::from_secs(30),
        }));

        // The broadcast shows who submitted but not what
        let snapshot = broadcasts(&effects)[0];
        assert_eq!(snapshot.kind, SnapshotKind::State);
        let a = snapshot.player("a").unwrap();
        assert!(a.submitted);
        assert_eq!(a.response, None);
        assert!(!snapshot.to_json().unwrap().contains("\"response\""));
    }

    #[test]
    fn test_new_name_rejected_mid_game() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.submit("a", 1).unwrap();
        assert!(matches!(hub.join("late"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_three_player_scenario() {
        let mut hub = hub_with(rules(), &["A", "B", "C"]);
        hub.submit("A", 40).unwrap();
        hub.submit("B", 60).unwrap();
        assert_eq!(hub.phase(), Phase::RoundOpen);

        let effects = hub.timer_fired(Timer::Deadline { round: 1 });
        let result = broadcasts(&effects)[0];

        assert_eq!(result.kind, SnapshotKind::Result);
        assert_eq!(result.target, Some(40.0));
        assert_eq!(result.average, Some(50.0));
        assert_eq!(result.winners, Some(vec!["A".to_string()]));
        assert_eq!(result.player("A").unwrap().response, Some(40));
        assert_eq!(result.player("B").unwrap().response, Some(60));
        assert_eq!(result.player("C").unwrap().response, None);

        assert_eq!(hub.player("A").unwrap().score, 1);
        assert_eq!(hub.player("B").unwrap().lives, 2);
        assert_eq!(hub.player("C").unwrap().lives, 2);
        assert_eq!(hub.phase(), Phase::Intermission { next_round: 2 });
        assert!(effects.contains(&Effect::Schedule {
            timer: Timer::NextRound { round: 2 },
            after: Duration::from_secs(5),
        }));
    }

    #[test]
    fn test_three_player_scenario_with_mean_target() {
        let mut r = rules();
        r.target_ratio = TargetRatio::new(1, 1);
        let mut hub = hub_with(r, &["A", "B", "C"]);
        hub.submit("A", 40).unwrap();
        hub.submit("B", 60).unwrap();

        let effects = hub.timer_fired(Timer::Deadline { round: 1 });
        let result = broadcasts(&effects)[0];
        assert_eq!(result.target, Some(50.0));
        assert_eq!(
            result.winners,
            Some(vec!["A".to_string(), "B".to_string()])
        );
        assert_eq!(hub.player("C").unwrap().lives, 2);
    }

    #[test]
    fn test_all_submitted_closes_early() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.submit("a", 0).unwrap();
        let effects = hub.submit("b", 100).unwrap();
        assert_eq!(broadcasts(&effects)[0].kind, SnapshotKind::Result);
        assert_eq!(hub.phase(), Phase::Intermission { next_round: 2 });

        // The late deadline of round 1 is stale now
        assert!(hub.timer_fired(Timer::Deadline { round: 1 }).is_empty());
    }

    #[test]
    fn test_overwrite_before_close() {
        let mut hub = hub_with(rules(), &["a", "b", "c"]);
        hub.submit("a", 90).unwrap();
        hub.submit("a", 0).unwrap();
        hub.submit("b", 50).unwrap();
        let effects = hub.submit("c", 60).unwrap();
        let result = broadcasts(&effects)[0];
        assert_eq!(result.player("a").unwrap().response, Some(0));
    }

    #[test]
    fn test_submissions_ignored_during_intermission() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.submit("a", 0).unwrap();
        hub.submit("b", 100).unwrap();
        assert!(hub.submit("a", 5).is_err());
    }

    #[test]
    fn test_next_round_opens_after_intermission() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.submit("a", 0).unwrap();
        hub.submit("b", 100).unwrap();

        // Wrong round number is ignored
        assert!(hub.timer_fired(Timer::NextRound { round: 7 }).is_empty());

        let effects = hub.timer_fired(Timer::NextRound { round: 2 });
        assert_eq!(hub.phase(), Phase::RoundOpen);
        assert_eq!(hub.round_number(), 2);
        let state = broadcasts(&effects)[0];
        assert_eq!(state.kind, SnapshotKind::State);
        assert!(state.players.iter().all(|p| !p.submitted && p.response.is_none()));
    }

    #[test]
    fn test_zero_intermission_opens_immediately() {
        let mut r = rules();
        r.intermission_secs = 0;
        let mut hub = hub_with(r, &["a", "b"]);
        hub.submit("a", 0).unwrap();
        let effects = hub.submit("b", 100).unwrap();

        let kinds: Vec<_> = broadcasts(&effects).iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SnapshotKind::Result, SnapshotKind::State]);
        assert_eq!(hub.phase(), Phase::RoundOpen);
        assert_eq!(hub.round_number(), 2);
    }

    #[test]
    fn test_disconnected_abstainer_forfeits() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.submit("a", 30).unwrap();
        hub.leave("b");

        let effects = hub.timer_fired(Timer::Deadline { round: 1 });
        let snaps = broadcasts(&effects);
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].kind, SnapshotKind::Result);
        assert_eq!(snaps[1].kind, SnapshotKind::GameOver);
        assert_eq!(snaps[1].winners, Some(vec!["a".to_string()]));
        assert!(hub.player("b").unwrap().eliminated);
        assert!(hub.is_finished());
    }

    #[test]
    fn test_elimination_after_lives_run_out() {
        let mut r = rules();
        r.lives = 2;
        r.intermission_secs = 0;
        let mut hub = hub_with(r, &["a", "b", "c"]);

        // Mean 73.3, target 58.7: a is 28.7 away, b 31.3, c 41.3
        for _ in 0..2 {
            hub.submit("a", 30).unwrap();
            hub.submit("b", 90).unwrap();
            hub.submit("c", 100).unwrap();
        }

        // b and c lost twice
        assert!(hub.player("b").unwrap().eliminated);
        assert!(hub.player("c").unwrap().eliminated);
        assert_eq!(hub.player("a").unwrap().score, 2);
        assert!(hub.is_finished());
        assert_eq!(hub.snapshot().winners, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_eliminated_player_cannot_submit() {
        let mut r = rules();
        r.lives = 1;
        r.intermission_secs = 0;
        let mut hub = hub_with(r, &["a", "b", "c"]);
        hub.submit("a", 0).unwrap();
        hub.submit("b", 0).unwrap();
        hub.submit("c", 100).unwrap();

        assert!(hub.player("c").unwrap().eliminated);
        assert!(matches!(hub.submit("c", 0), Err(Error::InvalidInput(_))));
        assert_eq!(hub.active_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_stalemate_ends_game() {
        let mut r = rules();
        r.stall_limit = 3;
        r.intermission_secs = 0;
        let mut hub = hub_with(r, &["a", "b"]);

        for _ in 0..3 {
            hub.submit("a", 20).unwrap();
            hub.submit("b", 20).unwrap();
        }

        assert!(hub.is_finished());
        assert_eq!(hub.round_number(), 3);
        let snapshot = hub.snapshot();
        assert_eq!(snapshot.kind, SnapshotKind::GameOver);
        assert_eq!(snapshot.winners, Some(vec!["a".to_string(), "b".to_string()]));
        assert!(hub.players().iter().all(|p| !p.eliminated));
    }

    #[test]
    fn test_elimination_resets_stall_counter() {
        let mut r = rules();
        r.lives = 1;
        r.intermission_secs = 0;
        let mut hub = hub_with(r, &["a", "b", "c"]);
        hub.submit("a", 10).unwrap();
        hub.submit("b", 10).unwrap();
        hub.submit("c", 10).unwrap();
        assert_eq!(hub.stalled_rounds(), 1);

        hub.submit("a", 0).unwrap();
        hub.submit("b", 0).unwrap();
        hub.submit("c", 90).unwrap();
        assert_eq!(hub.stalled_rounds(), 0);
    }

    #[test]
    fn test_all_abstain_round() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.submit("a", 10).unwrap();
        hub.timer_fired(Timer::Deadline { round: 1 });
        // b stayed connected, so it only loses a life
        assert_eq!(hub.player("b").unwrap().lives, 2);

        hub.timer_fired(Timer::NextRound { round: 2 });
        let effects = hub.timer_fired(Timer::Deadline { round: 2 });
        let result = broadcasts(&effects)[0];
        assert_eq!(result.target, None);
        assert_eq!(result.winners, Some(Vec::new()));
        assert_eq!(hub.player("a").unwrap().lives, 3);
        assert_eq!(hub.player("b").unwrap().lives, 2);
        assert_eq!(hub.stalled_rounds(), 2);
        assert_eq!(hub.phase(), Phase::Intermission { next_round: 3 });
    }

    #[test]
    fn test_gameover_is_frozen() {
        let mut hub = hub_with(rules(), &["a", "b"]);
        hub.submit("a", 30).unwrap();
        hub.leave("b");
        hub.timer_fired(Timer::Deadline { round: 1 });
        let final_json = hub.snapshot().to_json().unwrap();

        assert!(hub.submit("a", 1).is_err());
        assert!(hub.leave("a").is_empty());
        assert!(hub.timer_fired(Timer::Deadline { round: 1 }).is_empty());

        // A returning player gets the final snapshot to itself
        let joined = hub.join("b").unwrap();
        assert_eq!(joined.kind, JoinKind::Reconnect);
        match &joined.effects[..] {
            [Effect::Reply(s)] => assert_eq!(s.to_json().unwrap(), final_json),
            other => panic!("unexpected effects {:?}", other),
        }
        assert!(hub.join("stranger").is_err());
        assert_eq!(hub.snapshot().to_json().unwrap(), final_json);
    }

    #[test]
    fn test_snapshot_is_stable() {
        let mut hub = hub_with(rules(), &["a", "b", "c"]);
        hub.submit("b", 42).unwrap();
        assert_eq!(
            hub.snapshot().to_json().unwrap(),
            hub.snapshot().to_json().unwrap()
        );
    }

    #[test]
    fn test_elimination_is_monotone_across_snapshots() {
        let mut r = rules();
        r.lives = 1;
        r.intermission_secs = 0;
        let mut hub = hub_with(r, &["a", "b", "c", "d"]);
        let mut seen_eliminated: Vec<String> = Vec::new();

        let plays: [[u8; 4]; 3] = [[0, 0, 0, 100], [0, 0, 100, 0], [0, 100, 0, 0]];
        for play in plays {
            for (name, value) in ["a", "b", "c", "d"].iter().zip(play) {
                let Ok(effects) = hub.submit(name, value) else {
                    continue;
                };
                for snapshot in broadcasts(&effects) {
                    for name in &seen_eliminated {
                        assert!(snapshot.player(name).unwrap().eliminated);
                    }
                    for p in snapshot.players.iter().filter(|p| p.eliminated) {
                        if !seen_eliminated.contains(&p.name) {
                            seen_eliminated.push(p.name.clone());
                        }
                    }
                }
            }
        }
        assert!(hub.is_finished());
    }
}
