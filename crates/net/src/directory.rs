//! Hub directory
//!
//! Maps hub ids to running hub tasks. Ids handed out by a directory are
//! never issued twice, even after the hub they named has been reclaimed, so
//! a stale invite link can only ever fail with "not found".

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use keynes_core::{DirectoryConfig, Error as CoreError, GameRules, HubId, Phase};
use tokio::sync::{broadcast, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::hub_task::{spawn_hub, HubHandle, HubStatus};

/// Collisions tolerated before `create_hub` gives up
pub const MAX_ID_ATTEMPTS: usize = 16;

#[derive(Default)]
struct Inner {
    hubs: HashMap<HubId, HubHandle>,
    issued: HashSet<HubId>,
}

/// Registry of live hubs
pub struct HubDirectory {
    inner: RwLock<Inner>,
    rules: GameRules,
    config: DirectoryConfig,
}

impl HubDirectory {
    pub fn new(rules: GameRules, config: DirectoryConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            rules,
            config,
        }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Create a hub under a freshly minted id
    pub async fn create_hub(&self) -> Result<HubId> {
        self.create_hub_with(HubId::generate).await
    }

    /// Create a hub, drawing candidate ids from `mint`
    pub async fn create_hub_with<F>(&self, mut mint: F) -> Result<HubId>
    where
        F: FnMut() -> HubId,
    {
        let mut inner = self.inner.write().await;

        if let Some(max) = self.config.max_hubs {
            if inner.hubs.len() >= max {
                warn!(max_hubs = max, "Hub limit reached");
                return Err(CoreError::HubLimitReached(max).into());
            }
        }

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = mint();
            if inner.issued.contains(&id) {
                debug!(hub = %id, "Hub id collision");
                continue;
            }

            inner.issued.insert(id.clone());
            let handle = spawn_hub(id.clone(), self.rules.clone());
            inner.hubs.insert(id.clone(), handle);
            info!(hub = %id, hubs = inner.hubs.len(), "Hub created");
            return Ok(id);
        }

        warn!(attempts = MAX_ID_ATTEMPTS, "Could not mint a hub id");
        Err(CoreError::ExhaustedIdentifierSpace(MAX_ID_ATTEMPTS).into())
    }

    /// Look up a hub by its id as received from a client
    pub async fn get_hub(&self, id: &str) -> Result<HubHandle> {
        let id = HubId::parse(id)?;
        self.inner
            .read()
            .await
            .hubs
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("hub '{}'", id)).into())
    }

    pub async fn contains(&self, id: &HubId) -> bool {
        self.inner.read().await.hubs.contains_key(id)
    }

    /// Number of live hubs
    pub async fn len(&self) -> usize {
        self.inner.read().await.hubs.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Reclaim hubs nobody is connected to that are finished or have sat
    /// idle for the configured timeout. Returns the reclaimed ids.
    pub async fn reap(&self) -> Vec<HubId> {
        let now = Instant::now();
        let idle_timeout = self.config.idle_timeout();
        let mut inner = self.inner.write().await;

        let expired: Vec<HubId> = inner
            .hubs
            .iter()
            .filter(|(_, handle)| is_reclaimable(&handle.status(), now, idle_timeout))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(handle) = inner.hubs.remove(id) {
                handle.shutdown();
                info!(hub = %id, "Hub reclaimed");
            }
        }

        expired
    }

    /// Stop every hub task
    pub async fn shutdown_all(&self) {
        let mut inner = self.inner.write().await;
        for (_, handle) in inner.hubs.drain() {
            handle.shutdown();
        }
    }

    /// Sweep the directory until shutdown is signalled
    pub async fn run_reaper(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let interval = self.config.reap_interval();

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let reclaimed = self.reap().await;
                    if !reclaimed.is_empty() {
                        debug!(count = reclaimed.len(), "Reaper pass");
                    }
                }
                _ = shutdown_rx.recv() => {
                    debug!("Reaper shutting down");
                    break;
                }
            }
        }
    }
}

fn is_reclaimable(status: &HubStatus, now: Instant, idle_timeout: std::time::Duration) -> bool {
    if status.connections > 0 {
        return false;
    }
    status.closed
        || status.phase == Phase::GameOver
        || now.duration_since(status.last_activity) >= idle_timeout
}
