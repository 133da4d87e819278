//! Keynes Network Library
//!
//! Runs hubs of the number game behind an HTTP and WebSocket server.
//!
//! # Architecture
//!
//! - **Directory**: maps hub ids to running hub tasks and reclaims idle ones
//! - **Hub task**: one tokio task per hub owning the game state, its
//!   connections and its timer
//! - **Gateway**: serializes each snapshot once and fans it out
//! - **Server**: axum routes for pages, hub creation and WebSocket joins
//!
//! # Usage
//!
//! ```ignore
//! let config = Config::from_env()?;
//! let server = Server::start(&config).await?;
//!
//! // Hubs can also be driven directly
//! let hub = server.directory().create_hub().await?;
//! let handle = server.directory().get_hub(hub.as_str()).await?;
//! let (tx, mut rx) = outbox();
//! let session = handle.join("alice", tx).await?;
//! handle.submit(session.conn, "42".into()).await?;
//! ```

pub mod directory;
pub mod error;
mod frame;
mod gateway;
pub mod hub_task;
pub mod invite;
pub mod page;
pub mod protocol;
pub mod registry;
pub mod server;

pub use directory::{HubDirectory, MAX_ID_ATTEMPTS};
pub use error::{Error, Result};
pub use frame::MAX_FRAME_LEN;
pub use hub_task::{spawn_hub, HubHandle, HubStatus, Session};
pub use invite::InviteUrl;
pub use protocol::{CreateHubResponse, Outbound};
pub use registry::{outbox, ConnId, Outbox, OUTBOX_CAPACITY};
pub use server::{router, AppState, Server};
