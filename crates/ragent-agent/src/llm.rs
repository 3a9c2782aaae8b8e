use crate::backends::openai::OpenAiBackend;
use crate::backends::LlmBackend;
use crate::config::ModelConfig;
use crate::tools::ToolDescriptor;
use ragent_core::{Message, RagentError, RagentResult, ToolCall};
use std::time::Duration;
use tracing::error;

/// Response from the LLM: plain text, or a request to call tools.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmResponse {
    /// Text that stopped for a reason other than `stop` (e.g. `length`).
    Text(String),
    /// The model asked for tool calls.
    ToolUse {
        /// Text sent alongside the calls, if any.
        content: Option<String>,
        /// Calls in the order the model listed them.
        tool_calls: Vec<ToolCall>,
    },
    /// Text with finish reason `stop`.
    Done(String),
}

impl LlmResponse {
    /// The textual part of the response, empty if there is none.
    pub fn text(&self) -> &str {
        match self {
            LlmResponse::Text(text) | LlmResponse::Done(text) => text,
            LlmResponse::ToolUse { content, .. } => content.as_deref().unwrap_or_default(),
        }
    }
}

/// How the model may use the tools it is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// The model must answer in text.
    None,
}

impl ToolChoice {
    /// Wire value of the `tool_choice` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
        }
    }
}

/// Completion client with a per-call deadline.
pub struct LlmClient {
    backend: Box<dyn LlmBackend>,
    timeout: Duration,
}

impl LlmClient {
    /// Validate `config` and connect the matching HTTP backend.
    pub fn new(config: ModelConfig) -> RagentResult<Self> {
        config.validate()?;
        let timeout = config.timeout();
        Ok(Self {
            backend: Box::new(OpenAiBackend::new(config)?),
            timeout,
        })
    }

    /// Create from a pre-built backend (custom providers, tests).
    pub fn from_backend(backend: Box<dyn LlmBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Run one chat completion. Exceeding the deadline is a `Completion` error.
    pub async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        tool_choice: ToolChoice,
    ) -> RagentResult<LlmResponse> {
        match tokio::time::timeout(self.timeout, self.backend.chat(messages, tools, tool_choice))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(timeout_secs = self.timeout.as_secs(), "Completion call timed out");
                Err(RagentError::Completion(format!(
                    "no response within {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
