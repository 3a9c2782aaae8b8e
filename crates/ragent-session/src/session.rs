use chrono::{DateTime, Utc};
use ragent_core::{Message, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// One conversation: its id, ordered messages, and activity timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique session id.
    pub id: String,
    /// Messages in the order they were added.
    pub messages: Vec<Message>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session last saw activity.
    pub last_active_at: DateTime<Utc>,
    /// Monotonic mirror of `last_active_at`, used for expiry.
    #[serde(skip, default = "Instant::now")]
    last_touch: Instant,
}

impl Session {
    /// A fresh session with a random UUID.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// A fresh session with a caller-chosen id.
    pub fn with_id(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            last_active_at: now,
            last_touch: Instant::now(),
        }
    }

    /// Refresh the activity timestamps.
    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
        self.last_touch = Instant::now();
    }

    /// Append a message and mark the session active.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Time since the last activity.
    pub fn idle_for(&self) -> Duration {
        self.last_touch.elapsed()
    }

    /// True once the session has been idle for strictly longer than `ttl`.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.idle_for() > ttl
    }

    /// Messages that are not system messages.
    pub fn non_system_count(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_system()).count()
    }

    /// Keep every system message plus the newest `limit` others, in order.
    ///
    /// Returns the number of messages dropped.
    pub fn trim(&mut self, limit: usize) -> usize {
        let excess = self.non_system_count().saturating_sub(limit);
        if excess == 0 {
            return 0;
        }
        let mut skipped = 0;
        self.messages.retain(|m| {
            if m.role == Role::System || skipped == excess {
                true
            } else {
                skipped += 1;
                false
            }
        });
        excess
    }

    /// Total messages held.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
