//! Hub identifier - the opaque code shared in invite links

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Length of a generated hub id
pub const HUB_ID_LEN: usize = 12;

/// An opaque, URL-safe hub identifier.
///
/// Ids are drawn from `[A-Za-z0-9]`, so they can be dropped into a path
/// segment or query string without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HubId(String);

impl HubId {
    /// Generate a random id from the thread-local RNG
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generate a random id from the given RNG
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let id: String = rng
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(HUB_ID_LEN)
            .map(char::from)
            .collect();
        Self(id)
    }

    /// Parse and validate an id received from a client
    pub fn parse(s: &str) -> Result<Self> {
        if s.len() != HUB_ID_LEN || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(Error::NotFound(format!("hub '{}'", s)));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HubId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HubId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HubId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<HubId> for String {
    fn from(id: HubId) -> Self {
        id.0
    }
}
