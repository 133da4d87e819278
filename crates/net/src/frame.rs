//! Frame decoding/encoding
//!
//! Inbound: a text frame holding one decimal integer in `0..=100`.
//! Outbound: one JSON snapshot per text frame.
//! Maximum inbound frame size: 64 bytes (sanity limit)

use std::sync::Arc;

use keynes_core::{parse_submission, Snapshot};

use crate::error::{Error, Result};
use crate::protocol::Outbound;

/// Maximum accepted inbound frame length in bytes
pub const MAX_FRAME_LEN: usize = 64;

/// Decode a submission frame
pub fn decode_submission(payload: &str) -> Result<u8> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(Error::Protocol(format!(
            "Frame too large: {} bytes (max {})",
            payload.len(),
            MAX_FRAME_LEN
        )));
    }
    Ok(parse_submission(payload)?)
}

/// Encode a snapshot once for every recipient
pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Outbound> {
    let json = snapshot.to_json()?;
    Ok(Outbound::Text(Arc::from(json)))
}
