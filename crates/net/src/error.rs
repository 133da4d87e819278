//! Network error types

use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] keynes_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Hub closed")]
    HubClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

impl Error {
    /// HTTP status reported for this error
    pub fn status(&self) -> StatusCode {
        use keynes_core::Error as Core;

        match self {
            Error::Core(Core::NotFound(_)) | Error::HubClosed => StatusCode::NOT_FOUND,
            Error::Core(Core::InvalidInput(_)) | Error::Protocol(_) => StatusCode::BAD_REQUEST,
            Error::Core(Core::HubFull(_)) => StatusCode::FORBIDDEN,
            Error::Core(Core::ExhaustedIdentifierSpace(_) | Core::HubLimitReached(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Rejected requests; everything else is a server fault
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Core(e) => e.is_client_error(),
            Error::HubClosed | Error::Protocol(_) => true,
            _ => false,
        }
    }

    /// Message shown to the person behind the request
    pub fn user_message(&self) -> String {
        use keynes_core::Error as Core;

        match self {
            Error::Core(Core::NotFound(_)) | Error::HubClosed => "Invalid invite link".into(),
            Error::Core(Core::InvalidInput(msg)) => msg.clone(),
            Error::Protocol(msg) => msg.clone(),
            Error::Core(Core::HubFull(_)) => "Hub is full".into(),
            Error::Core(Core::ExhaustedIdentifierSpace(_)) => "Failed to create hub".into(),
            Error::Core(Core::HubLimitReached(_)) => "Too many hubs, try again later".into(),
            _ => "Internal server error".into(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if self.is_client_error() {
            tracing::debug!(error = %self, "Request rejected");
        } else {
            tracing::error!(error = %self, "Request failed");
        }
        (status, self.user_message()).into_response()
    }
}
