//! Error types for Keynes Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Hub is full ({0} players)")]
    HubFull(usize),

    #[error("Could not mint a new hub id after {0} attempts")]
    ExhaustedIdentifierSpace(usize),

    #[error("Hub limit reached ({0} hubs)")]
    HubLimitReached(usize),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Errors a client can cause; these are rejected quietly and never
    /// reported as server faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::InvalidInput(_) | Error::HubFull(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
