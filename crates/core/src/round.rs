//! Round engine
//!
//! A round collects at most one number per active player, then scores them
//! against a target derived from all submitted numbers:
//!
//! ```text
//! target = (p / q) * mean(submissions)
//! ```
//!
//! where `p / q` is the configured [`TargetRatio`]. Winners are every
//! submitter closest to the target. Distances are compared on the exact
//! integer key `|r * q * n - p * S|` (`S` the sum, `n` the count), which is
//! proportional to `|r - target|`, so ties never depend on float rounding
//! or on the order submissions arrived in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::TargetRatio;
use crate::error::{Error, Result};

/// Highest number a player may submit
pub const MAX_RESPONSE: u8 = 100;

/// Parse an inbound submission frame: a decimal integer in `0..=100`,
/// surrounding whitespace allowed
pub fn parse_submission(payload: &str) -> Result<u8> {
    let value: u8 = payload
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("not a number: {:?}", payload)))?;
    if value > MAX_RESPONSE {
        return Err(Error::InvalidInput(format!("out of range: {}", value)));
    }
    Ok(value)
}

/// One submission window
#[derive(Debug, Clone)]
pub struct Round {
    number: u32,
    submissions: BTreeMap<String, u8>,
    closed: bool,
}

impl Round {
    pub fn open(number: u32) -> Self {
        Self {
            number,
            submissions: BTreeMap::new(),
            closed: false,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    /// Record a submission, replacing any earlier one from the same player
    pub fn submit(&mut self, name: &str, value: u8) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidTransition(format!(
                "round {} is closed",
                self.number
            )));
        }
        if value > MAX_RESPONSE {
            return Err(Error::InvalidInput(format!("out of range: {}", value)));
        }
        self.submissions.insert(name.to_string(), value);
        Ok(())
    }

    /// Stop accepting submissions. Fails if already closed.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidTransition(format!(
                "round {} closed twice",
                self.number
            )));
        }
        self.closed = true;
        Ok(())
    }

    pub fn response(&self, name: &str) -> Option<u8> {
        self.submissions.get(name).copied()
    }

    pub fn has_submitted(&self, name: &str) -> bool {
        self.submissions.contains_key(name)
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.len()
    }

    pub fn submissions(&self) -> &BTreeMap<String, u8> {
        &self.submissions
    }
}

/// Result of scoring one closed round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u32,
    /// Absent when nobody submitted
    pub target: Option<f64>,
    pub average: Option<f64>,
    /// Closest submitters, in join order
    pub winners: Vec<String>,
    /// Every other active player, in join order
    pub losers: Vec<String>,
}

impl RoundOutcome {
    pub fn is_winner(&self, name: &str) -> bool {
        self.winners.iter().any(|w| w == name)
    }
}

/// Exact distance key of `value` from the target of `sum / count * ratio`
fn distance_key(ratio: TargetRatio, value: u8, sum: u64, count: u64) -> u128 {
    let lhs = value as i128 * ratio.denominator as i128 * count as i128;
    let rhs = ratio.numerator as i128 * sum as i128;
    (lhs - rhs).unsigned_abs()
}

/// Target for a set of values, `None` if empty
pub fn compute_target(ratio: TargetRatio, values: impl IntoIterator<Item = u8>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0u64, 0u64), |(s, c), v| (s + v as u64, c + 1));
    if count == 0 {
        return None;
    }
    Some(ratio.numerator as f64 * sum as f64 / (ratio.denominator as f64 * count as f64))
}

/// Score a closed round.
///
/// `active` lists the active players in join order. Submissions from names
/// not in `active` are ignored. Active players without a submission lose,
/// unless nobody submitted at all.
pub fn score_round(
    round: &Round,
    ratio: TargetRatio,
    active: &[&str],
) -> RoundOutcome {
    let responses: Vec<(&str, u8)> = active
        .iter()
        .filter_map(|name| round.response(name).map(|v| (*name, v)))
        .collect();

    if responses.is_empty() {
        return RoundOutcome {
            round: round.number(),
            target: None,
            average: None,
            winners: Vec::new(),
            losers: Vec::new(),
        };
    }

    let sum: u64 = responses.iter().map(|(_, v)| *v as u64).sum();
    let count = responses.len() as u64;

    let best = responses
        .iter()
        .map(|(_, v)| distance_key(ratio, *v, sum, count))
        .min()
        .unwrap_or_default();

    let winners: Vec<String> = responses
        .iter()
        .filter(|(_, v)| distance_key(ratio, *v, sum, count) == best)
        .map(|(name, _)| name.to_string())
        .collect();

    let losers = active
        .iter()
        .filter(|name| !winners.iter().any(|w| w == *name))
        .map(|name| name.to_string())
        .collect();

    RoundOutcome {
        round: round.number(),
        target: compute_target(ratio, responses.iter().map(|(_, v)| *v)),
        average: Some(sum as f64 / count as f64),
        winners,
        losers,
    }
}
