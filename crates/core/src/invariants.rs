//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::hub::{Hub, Phase};
use crate::round::{Round, RoundOutcome};

/// Validate that a hub's state is internally consistent
pub fn assert_hub_invariants(hub: &Hub) {
    for player in hub.players() {
        // Lives run out exactly when the player is eliminated
        debug_assert!(
            player.eliminated == (player.lives == 0),
            "Hub {} player {} has {} lives but eliminated={}",
            hub.id(),
            player.name,
            player.lives,
            player.eliminated
        );
    }

    // Names are unique
    let players = hub.players();
    for (i, player) in players.iter().enumerate() {
        debug_assert!(
            !players[i + 1..].iter().any(|p| p.name == player.name),
            "Hub {} has duplicate player {}",
            hub.id(),
            player.name
        );
    }

    match hub.phase() {
        Phase::Lobby => {
            debug_assert!(
                hub.round_number() == 0,
                "Hub {} in lobby at round {}",
                hub.id(),
                hub.round_number()
            );
            debug_assert!(
                players.iter().all(|p| p.is_connected() && !p.eliminated),
                "Hub {} lobby holds a disconnected or eliminated player",
                hub.id()
            );
        }
        Phase::RoundOpen => {
            debug_assert!(
                hub.round_number() > 0,
                "Hub {} has an open round numbered 0",
                hub.id()
            );
        }
        Phase::Intermission { next_round } => {
            debug_assert!(
                next_round == hub.round_number() + 1,
                "Hub {} waits for round {} after round {}",
                hub.id(),
                next_round,
                hub.round_number()
            );
        }
        Phase::GameOver => {}
    }
}

/// Validate a round outcome against the round it was computed from
pub fn assert_outcome_invariants(outcome: &RoundOutcome, round: &Round) {
    debug_assert!(
        !round.is_open(),
        "Round {} scored while still open",
        round.number()
    );

    let winners_submitted = outcome.winners.iter().all(|w| round.has_submitted(w));
    debug_assert!(
        winners_submitted,
        "Round {} has a winner without a submission",
        round.number()
    );
    debug_assert!(
        outcome.target.is_none() || !outcome.winners.is_empty(),
        "Round {} has a target but no winner",
        round.number()
    );

    // Winners and losers are disjoint
    debug_assert!(
        !outcome.winners.iter().any(|w| outcome.losers.contains(w)),
        "Round {} lists a player as both winner and loser",
        round.number()
    );

    // Every winner sits at the minimal distance
    if let Some(target) = outcome.target {
        let best = round
            .submissions()
            .iter()
            .filter(|(name, _)| outcome.winners.contains(*name) || outcome.losers.contains(*name))
            .map(|(_, v)| (*v as f64 - target).abs())
            .fold(f64::INFINITY, f64::min);
        for winner in &outcome.winners {
            let distance = round
                .response(winner)
                .map(|v| (v as f64 - target).abs())
                .unwrap_or(f64::INFINITY);
            debug_assert!(
                (distance - best).abs() < 1e-9,
                "Round {} winner {} is {} away, best is {}",
                round.number(),
                winner,
                distance,
                best
            );
        }
    }
}
