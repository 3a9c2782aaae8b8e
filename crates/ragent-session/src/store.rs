use crate::session::Session;
use async_trait::async_trait;
use ragent_core::{Message, RagentResult, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Storage backend for conversation sessions.
///
/// Missing and expired sessions are not errors: `append` drops the message,
/// `history` returns nothing, and `exists` reports `false`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a new empty session and return its id.
    async fn create(&self) -> RagentResult<String>;
    /// Append a message, refresh activity, and trim old history.
    async fn append(&self, id: &str, role: Role, content: &str) -> RagentResult<()>;
    async fn history(&self, id: &str) -> RagentResult<Vec<Message>>;
    /// Whether the session is present and live. Evicts it if expired.
    async fn exists(&self, id: &str) -> RagentResult<bool>;
    /// Evict every expired session. Returns how many were removed.
    async fn sweep(&self) -> RagentResult<usize>;
    async fn active_count(&self) -> usize;
}

/// Session lifetime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session expires.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Number of user/assistant exchanges kept per session.
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// How often the server sweeps expired sessions.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_history() -> usize {
    10
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_history: default_max_history(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SessionConfig {
    /// Idle time after which a session expires.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Period of the background sweep.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Process-local session store.
///
/// The map lock is held only to find or remove an entry; each session has
/// its own mutex, so appends to one session are serialized without blocking
/// the others. Expiry is checked on every access; `sweep` is an extra.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    ttl: Duration,
    max_history: usize,
}

impl InMemorySessionStore {
    /// A store expiring sessions after `ttl` and keeping `2 * max_history` non-system messages.
    pub fn new(ttl: Duration, max_history: usize) -> Self {
        info!(
            ttl_secs = ttl.as_secs(),
            max_history, "Session store initialized"
        );
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            max_history,
        }
    }

    /// Build a store from the `[session]` config section.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.ttl(), config.max_history)
    }

    /// Upper bound on non-system messages kept per session.
    pub fn history_limit(&self) -> usize {
        self.max_history * 2
    }

    /// Look up a live session, evicting it if it has expired.
    async fn live(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        let entry = self.sessions.read().await.get(id).cloned()?;
        let expired = entry.lock().await.is_expired(self.ttl);
        if expired {
            self.evict(id).await;
            return None;
        }
        Some(entry)
    }

    async fn evict(&self, id: &str) {
        let mut sessions = self.sessions.write().await;
        let still_expired = match sessions.get(id) {
            // A session locked by someone else is in use.
            Some(entry) => entry
                .try_lock()
                .map(|s| s.is_expired(self.ttl))
                .unwrap_or(false),
            None => false,
        };
        if still_expired {
            sessions.remove(id);
            info!(session_id = %id, "Session expired");
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> RagentResult<String> {
        let session = Session::new();
        let id = session.id.clone();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        info!(session_id = %id, "Created new session");
        Ok(id)
    }

    async fn append(&self, id: &str, role: Role, content: &str) -> RagentResult<()> {
        let Some(entry) = self.live(id).await else {
            warn!(session_id = %id, "Session is missing or expired, message dropped");
            return Ok(());
        };

        let mut session = entry.lock().await;
        // Expiry may have passed while waiting for the lock.
        if session.is_expired(self.ttl) {
            warn!(session_id = %id, "Session expired, message dropped");
            return Ok(());
        }
        session.add_message(Message::new(role, content));
        let dropped = session.trim(self.history_limit());
        if dropped > 0 {
            info!(
                session_id = %id,
                dropped,
                remaining = session.message_count(),
                "Trimmed session history"
            );
        }
        Ok(())
    }

    async fn history(&self, id: &str) -> RagentResult<Vec<Message>> {
        match self.live(id).await {
            Some(entry) => Ok(entry.lock().await.messages.clone()),
            None => {
                debug!(session_id = %id, "No history: session missing or expired");
                Ok(Vec::new())
            }
        }
    }

    async fn exists(&self, id: &str) -> RagentResult<bool> {
        Ok(self.live(id).await.is_some())
    }

    async fn sweep(&self) -> RagentResult<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| {
            entry
                .try_lock()
                .map(|s| !s.is_expired(self.ttl))
                .unwrap_or(true)
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, "Cleaned up expired sessions");
        }
        Ok(removed)
    }

    async fn active_count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|entry| {
                entry
                    .try_lock()
                    .map(|s| !s.is_expired(self.ttl))
                    .unwrap_or(true)
            })
            .count()
    }
}
