//! Invite URL generation and parsing
//!
//! Invite format: `<origin>/<hub-id>`, e.g. `https://play.example.com/Ab3dEf6hIj9K`

use std::fmt;
use std::str::FromStr;

use keynes_core::HubId;

use crate::error::{Error, Result};

/// Parsed invite information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteUrl {
    /// Scheme and authority, without a trailing slash
    pub origin: String,
    pub hub: HubId,
}

impl InviteUrl {
    pub fn new(origin: &str, hub: HubId) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            hub,
        }
    }

    /// Format as URL string
    pub fn to_url(&self) -> String {
        format!("{}/{}", self.origin, self.hub)
    }

    /// Parse from URL string
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| Error::Protocol("Invalid invite URL: missing scheme".into()))?;
        if scheme != "http" && scheme != "https" {
            return Err(Error::Protocol(format!(
                "Invalid invite URL: unsupported scheme '{}'",
                scheme
            )));
        }

        // Query and fragment are not part of the invite
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let rest = rest.trim_end_matches('/');

        let (authority, hub) = rest
            .rsplit_once('/')
            .ok_or_else(|| Error::Protocol("Invalid invite URL: missing hub id".into()))?;
        if authority.is_empty() {
            return Err(Error::Protocol("Invalid invite URL: missing host".into()));
        }

        let hub = HubId::parse(hub)?;
        Ok(Self {
            origin: format!("{}://{}", scheme, authority),
            hub,
        })
    }
}

impl fmt::Display for InviteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_url())
    }
}

impl FromStr for InviteUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
