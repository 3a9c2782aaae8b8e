/// OpenAI-compatible chat completions (OpenAI and Azure).
pub mod openai;

use crate::llm::{LlmResponse, ToolChoice};
use crate::tools::ToolDescriptor;
use async_trait::async_trait;
use ragent_core::{Message, RagentResult};

/// Trait for completion provider backends.
///
/// Each backend handles its own wire format. `messages` is the full
/// conversation, system prompt included. An empty `tools` slice means the
/// request carries no tool schema and `tool_choice` is ignored.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        tool_choice: ToolChoice,
    ) -> RagentResult<LlmResponse>;
}
