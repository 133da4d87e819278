//! HTTP and WebSocket server
//!
//! Routes:
//!
//! - `GET /` landing page
//! - `POST /create-hub` creates a hub and returns `{"hub": "<id>"}`
//! - `GET /ws?hub=<id>&name=<name>` joins the hub, then upgrades
//! - `GET /<id>[?name=<name>]` game page, or a name prompt without `name`
//! - `GET /healthz` liveness probe
//!
//! A join is settled before the upgrade, so a bad hub or name is answered
//! with a plain HTTP status instead of a socket that closes at once.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use keynes_core::{Config, HubId};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::directory::HubDirectory;
use crate::error::{Error, Result};
use crate::frame::MAX_FRAME_LEN;
use crate::hub_task::{HubHandle, Session};
use crate::invite::InviteUrl;
use crate::page;
use crate::protocol::{CreateHubResponse, Outbound, PageParams, WsParams};
use crate::registry::outbox;

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<HubDirectory>,
    /// Origin for invite links; taken from the `Host` header when absent
    pub origin: Option<String>,
}

impl AppState {
    fn origin_for(&self, headers: &HeaderMap) -> String {
        if let Some(origin) = &self.origin {
            return origin.clone();
        }
        let host = headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        format!("http://{}", host)
    }
}

/// Build the router over the given state
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/healthz", get(health))
        .route("/create-hub", post(create_hub))
        .route("/ws", get(ws_handler))
        .route("/:hub", get(game_page))
        .with_state(state)
}

/// Game server handle
pub struct Server {
    addr: SocketAddr,
    directory: Arc<HubDirectory>,
    shutdown_tx: broadcast::Sender<()>,
    serve: JoinHandle<()>,
}

impl Server {
    /// Bind the configured address and start serving
    pub async fn start(config: &Config) -> Result<Self> {
        let listener = TcpListener::bind(config.server.bind).await?;
        let addr = listener.local_addr()?;

        let directory = Arc::new(HubDirectory::new(
            config.game.clone(),
            config.directory.clone(),
        ));
        let state = AppState {
            directory: directory.clone(),
            origin: config
                .server
                .public_origin
                .as_ref()
                .map(|o| o.trim_end_matches('/').to_string()),
        };

        let (shutdown_tx, _) = broadcast::channel(1);

        // Spawn reaper
        tokio::spawn(directory.clone().run_reaper(shutdown_tx.subscribe()));

        // Spawn HTTP server
        let mut shutdown_rx = shutdown_tx.subscribe();
        let app = router(state);
        let serve = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Server failed");
            }
        });

        info!(addr = %addr, "Server started");

        Ok(Server {
            addr,
            directory,
            shutdown_tx,
            serve,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn directory(&self) -> &Arc<HubDirectory> {
        &self.directory
    }

    /// Stop accepting requests and close every hub
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        self.directory.shutdown_all().await;
        info!("Server shutdown initiated");
    }

    /// Wait for the server to finish
    pub async fn wait(self) {
        if let Err(e) = self.serve.await {
            warn!(error = %e, "Server task ended abnormally");
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn home(State(state): State<AppState>) -> Result<Html<String>> {
    Ok(Html(page::render_home(state.directory.rules().target_ratio)?))
}

async fn create_hub(State(state): State<AppState>) -> Result<Json<CreateHubResponse>> {
    let hub = state.directory.create_hub().await?;
    Ok(Json(CreateHubResponse {
        hub: hub.to_string(),
    }))
}

async fn game_page(
    State(state): State<AppState>,
    Path(hub): Path<String>,
    Query(params): Query<PageParams>,
    headers: HeaderMap,
) -> Result<Html<String>> {
    let handle = state.directory.get_hub(&hub).await?;
    let hub: HubId = handle.id().clone();

    let name = params.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() {
        return Ok(Html(page::render_join(&hub)?));
    }

    let invite = InviteUrl::new(&state.origin_for(&headers), hub);
    Ok(Html(page::render_game(&invite, name)?))
}

async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let hub = params
        .hub
        .ok_or_else(|| Error::Protocol("Hub and name parameters required".into()))?;
    let name = params
        .name
        .ok_or_else(|| Error::Protocol("Hub and name parameters required".into()))?;

    let handle = state.directory.get_hub(&hub).await?;
    let (tx, rx) = outbox();
    let session = handle.join(&name, tx).await?;

    let cleanup = handle.clone();
    let conn = session.conn;
    Ok(ws
        .on_failed_upgrade(move |e| {
            debug!(conn = %conn, error = %e, "Upgrade failed");
            tokio::spawn(async move {
                let _ = cleanup.leave(conn).await;
            });
        })
        .on_upgrade(move |socket| handle_socket(socket, handle, session, rx))
        .into_response())
}

/// Pump one WebSocket until either side goes away
async fn handle_socket(
    socket: WebSocket,
    handle: HubHandle,
    session: Session,
    mut rx: mpsc::Receiver<Outbound>,
) {
    let conn = session.conn;
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            match outbound {
                Outbound::Text(text) => {
                    if sink.send(Message::Text(text.to_string())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let reader = async {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if text.len() > MAX_FRAME_LEN {
                        debug!(conn = %conn, len = text.len(), "Ignoring oversized frame");
                        continue;
                    }
                    if handle.submit(conn, text).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(conn = %conn, error = %e, "Read failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {}
        _ = &mut writer => {}
    }

    debug!(hub = %handle.id(), conn = %conn, player = %session.name, "Socket closed");
    let _ = handle.leave(conn).await;
    writer.abort();
}
