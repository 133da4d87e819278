//! Wire types exchanged with browsers
//!
//! Outbound WebSocket payloads are [`keynes_core::Snapshot`] JSON. Inbound
//! frames are plain decimal numbers (see [`crate::frame`]). The HTTP side
//! uses the small request/response bodies below.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Item queued for one connection's writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized snapshot, shared by every connection of a broadcast
    Text(Arc<str>),
    /// Ask the writer to close the socket
    Close,
}

/// Body of `POST /create-hub`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHubResponse {
    pub hub: String,
}

/// Query string of `GET /ws`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WsParams {
    pub hub: Option<String>,
    pub name: Option<String>,
}

/// Query string of `GET /<hub>`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub name: Option<String>,
}
