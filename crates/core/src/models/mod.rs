//! Data models for Keynes

mod hub_id;
mod player;

pub use hub_id::*;
pub use player::*;
