//! Keyed store of per-user portal clients.
//!
//! Callers pick the key (a web session id, a chat id, ...). A client is
//! handed out behind its own async mutex, so one user's operations run one
//! at a time while different users proceed in parallel over one transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::client::PortalClient;
use crate::config::PortalConfig;
use crate::error::PortalResult;
use crate::transport::{ReqwestTransport, Transport};

/// Idle time after which an entry is dropped (30 minutes).
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

pub type SharedClient = Arc<Mutex<PortalClient>>;

struct Entry {
    client: SharedClient,
    last_used: Instant,
}

pub struct SessionRegistry {
    config: PortalConfig,
    transport: Arc<dyn Transport>,
    entries: Mutex<HashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    /// Registry whose clients share one reqwest transport.
    pub fn new(config: PortalConfig) -> PortalResult<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: PortalConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            entries: Mutex::new(HashMap::new()),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// The client for `session_id`, created anonymous if absent or idle
    /// past the timeout.
    pub async fn acquire(&self, session_id: &str) -> SharedClient {
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(session_id) {
            if entry.last_used.elapsed() < self.idle_timeout {
                entry.last_used = Instant::now();
                return entry.client.clone();
            }
            tracing::debug!(session_id, "replacing idle session");
        }

        let client = Arc::new(Mutex::new(PortalClient::with_transport(
            self.config.clone(),
            self.transport.clone(),
        )));
        entries.insert(
            session_id.to_string(),
            Entry {
                client: client.clone(),
                last_used: Instant::now(),
            },
        );
        client
    }

    /// Log the client out and forget it. Returns whether it existed.
    pub async fn release(&self, session_id: &str) -> bool {
        let removed = self.entries.lock().await.remove(session_id);
        match removed {
            Some(entry) => {
                entry.client.lock().await.logout().await;
                true
            }
            None => false,
        }
    }

    /// Drop every entry idle past the timeout. Returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.last_used.elapsed() < self.idle_timeout);
        let purged = before - entries.len();
        if purged > 0 {
            tracing::info!(purged, "purged idle sessions");
        }
        purged
    }

    pub async fn active_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}
