//! Core types and error definitions for Ragent.
//!
//! This crate provides the foundational types shared across all Ragent crates:
//! the error taxonomy, conversation messages, and tool call abstractions.
//!
//! # Main types
//!
//! - [`RagentError`] — Unified error enum for all Ragent subsystems.
//! - [`RagentResult`] — Convenience alias for `Result<T, RagentError>`.
//! - [`Role`] — Message role (system, user, assistant, tool).
//! - [`Message`] — A single message within a conversation session.
//! - [`ToolCall`] — Represents an LLM-initiated tool invocation request.
//! - [`ToolResult`] — The result returned after executing a tool call.

/// Error taxonomy shared by every crate.
pub mod error;
/// Conversation messages and roles.
pub mod message;
/// Tool call request/response types.
pub mod tool;

pub use error::{RagentError, RagentResult};
pub use message::{Message, Role};
pub use tool::{ToolCall, ToolResult};
