//! Question answering for Ragent.
//!
//! The [`Orchestrator`] drives one turn of a conversation: it resolves the
//! session, asks the completion model whether to search the document index,
//! runs at most one round of `search_documents` calls, and records the final
//! answer.

/// Completion provider implementations.
pub mod backends;
/// Completion model settings.
pub mod config;
/// Completion client and response types.
pub mod llm;
/// The per-query state machine.
pub mod orchestrator;
/// Tool schema and typed tool requests.
pub mod tools;

pub use backends::LlmBackend;
pub use config::{LlmProvider, ModelConfig};
pub use llm::{LlmClient, LlmResponse, ToolChoice};
pub use orchestrator::{AskResponse, HealthStatus, Orchestrator, SYSTEM_PROMPT};
pub use tools::{ToolDescriptor, ToolRequest};
