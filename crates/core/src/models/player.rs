//! Player model

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest accepted display name, in characters
pub const MAX_NAME_LEN: usize = 32;

/// Normalize a requested display name.
///
/// Leading/trailing whitespace is dropped. Empty names, names longer than
/// [`MAX_NAME_LEN`] and names with control characters are rejected.
pub fn normalize_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::InvalidInput(format!(
            "name longer than {} characters",
            MAX_NAME_LEN
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(Error::InvalidInput("name contains control characters".into()));
    }
    Ok(name.to_string())
}

/// A participant in one hub.
///
/// A player outlives its connections: dropping every connection keeps the
/// score and elimination state so the same name can reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    /// Points, only ever increased by round wins
    pub score: u32,
    /// Remaining lives; reaching zero eliminates the player
    pub lives: u32,
    /// One-way flag
    pub eliminated: bool,
    /// Number of live connections bound to this player
    pub connections: usize,
}

impl Player {
    pub fn new(name: String, lives: u32) -> Self {
        Self {
            name,
            score: 0,
            lives,
            eliminated: false,
            connections: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.eliminated
    }

    pub fn is_connected(&self) -> bool {
        self.connections > 0
    }

    /// Take one life; returns true if this eliminated the player
    pub fn lose_life(&mut self) -> bool {
        if self.eliminated {
            return false;
        }
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            self.eliminated = true;
            return true;
        }
        false
    }

    /// Eliminate outright, regardless of remaining lives
    pub fn forfeit(&mut self) -> bool {
        if self.eliminated {
            return false;
        }
        self.lives = 0;
        self.eliminated = true;
        true
    }
}
