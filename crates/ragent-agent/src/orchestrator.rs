use crate::llm::{LlmClient, LlmResponse, ToolChoice};
use crate::tools::{format_search_results, ToolDescriptor, ToolRequest};
use ragent_core::{Message, RagentResult, Role, ToolCall, ToolResult};
use ragent_memory::DocumentRetriever;
use ragent_session::SessionStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Instruction placed at the start of every new session.
pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant with access to company knowledge base.

Your behavior:
- For questions about company policies, products, procedures, or specific factual information, use the search_documents tool to find relevant information before answering.
- For general questions, mathematical calculations, or common knowledge, you can answer directly without searching.
- Always provide clear, concise, and accurate answers.
- If you use information from documents, cite the sources.
- If you cannot find relevant information in the documents, say so clearly.

Remember: Use the search tool when the question requires company-specific information.";

/// The outcome of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AskResponse {
    /// The model's final answer.
    pub answer: String,
    /// Distinct document sources cited, in first-retrieved order.
    pub sources: Vec<String>,
    /// Session the turn was recorded in; new when none was continued.
    pub session_id: String,
}

/// Liveness report for `/api/health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    /// Always `healthy` while the process serves requests.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Whether the vector index holds any documents.
    pub vector_store_initialized: bool,
}

/// Progress of one turn.
///
/// `AwaitingModel` may go straight to `Done`; after `ToolExecuted` the only
/// way forward is `AwaitingModelFinal`, which always ends in `Done`.
#[derive(Debug)]
enum TurnState {
    New,
    ContextLoaded {
        session_id: String,
    },
    AwaitingModel {
        session_id: String,
        history: Vec<Message>,
    },
    ToolRequested {
        session_id: String,
        history: Vec<Message>,
        content: String,
        calls: Vec<ToolCall>,
    },
    ToolExecuted {
        session_id: String,
        history: Vec<Message>,
        sources: Vec<String>,
    },
    AwaitingModelFinal {
        session_id: String,
        history: Vec<Message>,
        sources: Vec<String>,
    },
    Done {
        session_id: String,
        answer: String,
        sources: Vec<String>,
    },
}

impl TurnState {
    fn name(&self) -> &'static str {
        match self {
            TurnState::New => "new",
            TurnState::ContextLoaded { .. } => "context_loaded",
            TurnState::AwaitingModel { .. } => "awaiting_model",
            TurnState::ToolRequested { .. } => "tool_requested",
            TurnState::ToolExecuted { .. } => "tool_executed",
            TurnState::AwaitingModelFinal { .. } => "awaiting_model_final",
            TurnState::Done { .. } => "done",
        }
    }
}

/// Answers questions, consulting the document index when the model asks to.
///
/// Each call to [`ask`](Self::ask) makes at most two completion calls: one
/// that may request `search_documents`, and, only if it did, one more with
/// the search results and no tools.
pub struct Orchestrator {
    llm: LlmClient,
    retriever: DocumentRetriever,
    sessions: Arc<dyn SessionStore>,
    tools: Vec<ToolDescriptor>,
    system_prompt: String,
}

impl Orchestrator {
    /// Wire the orchestrator to its completion client, retriever, and session store.
    pub fn new(
        llm: LlmClient,
        retriever: DocumentRetriever,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            llm,
            retriever,
            sessions,
            tools: vec![ToolDescriptor::search_documents()],
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    /// Replace the system prompt given to new sessions.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The session store turns are recorded in.
    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// The retriever backing `search_documents`.
    pub fn retriever(&self) -> &DocumentRetriever {
        &self.retriever
    }

    /// Answer `query` within the given session, or a new one if it is
    /// absent, unknown, or expired.
    pub async fn ask(&self, query: &str, session_id: Option<&str>) -> RagentResult<AskResponse> {
        let mut state = TurnState::New;

        loop {
            debug!(state = state.name(), "Turn transition");
            state = match state {
                TurnState::New => TurnState::ContextLoaded {
                    session_id: self.resolve_session(session_id).await?,
                },

                TurnState::ContextLoaded { session_id } => {
                    self.sessions.append(&session_id, Role::User, query).await?;
                    let history = self.sessions.history(&session_id).await?;
                    TurnState::AwaitingModel {
                        session_id,
                        history,
                    }
                }

                TurnState::AwaitingModel {
                    session_id,
                    history,
                } => match self.llm.chat(&history, &self.tools, ToolChoice::Auto).await? {
                    LlmResponse::ToolUse {
                        content,
                        tool_calls,
                    } if !tool_calls.is_empty() => {
                        info!(session_id = %session_id, calls = tool_calls.len(), "Agent decided to search documents");
                        TurnState::ToolRequested {
                            session_id,
                            history,
                            content: content.unwrap_or_default(),
                            calls: tool_calls,
                        }
                    }
                    response => {
                        info!(session_id = %session_id, "Agent answered directly without searching");
                        TurnState::Done {
                            session_id,
                            answer: response.text().to_string(),
                            sources: Vec::new(),
                        }
                    }
                },

                TurnState::ToolRequested {
                    session_id,
                    mut history,
                    content,
                    calls,
                } => {
                    let mut sources: Vec<String> = Vec::new();
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        let (result, found) = self.execute_tool(call).await?;
                        for source in found {
                            if !sources.contains(&source) {
                                sources.push(source);
                            }
                        }
                        results.push(result);
                    }

                    history.push(Message::assistant_tool_calls(content, calls));
                    for result in results {
                        history.push(Message::tool(result.call_id, result.content));
                    }
                    TurnState::ToolExecuted {
                        session_id,
                        history,
                        sources,
                    }
                }

                TurnState::ToolExecuted {
                    session_id,
                    history,
                    sources,
                } => TurnState::AwaitingModelFinal {
                    session_id,
                    history,
                    sources,
                },

                TurnState::AwaitingModelFinal {
                    session_id,
                    history,
                    sources,
                } => {
                    let response = self.llm.chat(&history, &[], ToolChoice::None).await?;
                    if let LlmResponse::ToolUse { tool_calls, .. } = &response {
                        warn!(
                            session_id = %session_id,
                            ignored_calls = tool_calls.len(),
                            "Model requested tools after the search round; using its text"
                        );
                    }
                    TurnState::Done {
                        session_id,
                        answer: response.text().to_string(),
                        sources,
                    }
                }

                TurnState::Done {
                    session_id,
                    answer,
                    sources,
                } => {
                    self.sessions
                        .append(&session_id, Role::Assistant, &answer)
                        .await?;
                    return Ok(AskResponse {
                        answer,
                        sources,
                        session_id,
                    });
                }
            };
        }
    }

    /// Report service liveness and index state.
    pub async fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            vector_store_initialized: self.retriever.is_initialized().await,
        }
    }

    async fn resolve_session(&self, requested: Option<&str>) -> RagentResult<String> {
        if let Some(id) = requested {
            if self.sessions.exists(id).await? {
                info!(session_id = %id, "Using existing session");
                return Ok(id.to_string());
            }
            debug!(session_id = %id, "Requested session unknown or expired");
        }
        let id = self.sessions.create().await?;
        self.sessions
            .append(&id, Role::System, &self.system_prompt)
            .await?;
        Ok(id)
    }

    /// Run one tool call, returning the message for the model and the
    /// sources it retrieved.
    ///
    /// Calls that fail validation are answered with an error result so the
    /// model can recover; retrieval failures abort the turn.
    async fn execute_tool(&self, call: &ToolCall) -> RagentResult<(ToolResult, Vec<String>)> {
        let request = match ToolRequest::from_call(call) {
            Ok(request) => request,
            Err(e) => {
                warn!(tool = %call.name, call_id = %call.id, error = %e, "Rejected tool call");
                return Ok((ToolResult::error(&call.id, format!("Error: {e}")), Vec::new()));
            }
        };

        match request {
            ToolRequest::SearchDocuments { query, num_results } => {
                info!(query = %query, num_results, "Searching documents");
                let results = self.retriever.retrieve(&query, Some(num_results)).await?;
                let sources = results.iter().map(|r| r.source.clone()).collect();
                Ok((
                    ToolResult::success(&call.id, format_search_results(&results)),
                    sources,
                ))
            }
        }
    }
}
