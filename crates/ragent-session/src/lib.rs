//! Conversation session management for Ragent.
//!
//! Sessions hold the ordered message history of one conversation. They expire
//! after an idle period and keep only the most recent exchanges.
//!
//! # Main types
//!
//! - [`Session`] — A conversation with its message history and timestamps.
//! - [`SessionStore`] — Async trait for session persistence backends.
//! - [`InMemorySessionStore`] — Process-local store with per-session locking.
//! - [`SessionConfig`] — TTL, history bound, and sweep cadence.

/// Session data model.
pub mod session;
/// Session store trait and the in-memory implementation.
pub mod store;

pub use session::Session;
pub use store::{InMemorySessionStore, SessionConfig, SessionStore};
