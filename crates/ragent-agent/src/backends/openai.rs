use super::LlmBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::llm::{LlmResponse, ToolChoice};
use crate::tools::ToolDescriptor;
use async_trait::async_trait;
use ragent_core::{Message, RagentError, RagentResult, Role, ToolCall};
use tracing::{debug, error};

/// OpenAI chat completions backend.
///
/// Also serves Azure OpenAI through its OpenAI-compatible `/openai/v1`
/// surface, which differs only in base URL and auth header.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Build a backend with an HTTP client bounded by the request timeout.
    pub fn new(config: ModelConfig) -> RagentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RagentError::Http(e.to_string()))?;
        Ok(Self { config, http })
    }

    fn build_messages(&self, messages: &[Message]) -> Vec<serde_json::Value> {
        messages.iter().map(encode_message).collect()
    }

    fn build_tools(&self, tools: &[ToolDescriptor]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect()
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        match self.config.provider {
            LlmProvider::OpenAi => request.bearer_auth(&self.config.api_key),
            LlmProvider::Azure => request.header("api-key", &self.config.api_key),
        }
    }
}

fn encode_message(m: &Message) -> serde_json::Value {
    match m.role {
        Role::Assistant if !m.tool_calls.is_empty() => {
            let calls: Vec<serde_json::Value> = m
                .tool_calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {
                            "name": tc.name,
                            "arguments": tc.arguments.to_string(),
                        }
                    })
                })
                .collect();
            let content = if m.content.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::String(m.content.clone())
            };
            serde_json::json!({
                "role": "assistant",
                "content": content,
                "tool_calls": calls,
            })
        }
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": m.tool_call_id.as_deref().unwrap_or_default(),
            "content": m.content,
        }),
        role => serde_json::json!({
            "role": role.as_str(),
            "content": m.content,
        }),
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
        tool_choice: ToolChoice,
    ) -> RagentResult<LlmResponse> {
        let url = self.config.chat_url();
        let mut body = serde_json::json!({
            "model": self.config.model_id,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
            "messages": self.build_messages(messages),
        });

        if !tools.is_empty() {
            body["tools"] = serde_json::json!(self.build_tools(tools));
            body["tool_choice"] = serde_json::json!(tool_choice.as_str());
        }

        debug!(
            model = %self.config.model_id,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| RagentError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RagentError::Http(e.to_string()))?;

        if !status.is_success() {
            error!(status = %status, body = %resp_body, "Chat completion request failed");
            return Err(RagentError::Completion(format!(
                "API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }
}

/// Decode a chat completions response body.
///
/// Tool call arguments that are not valid JSON are kept as the raw string,
/// so the tool schema check rejects them instead of seeing an empty object.
pub fn parse_openai_response(body: &serde_json::Value) -> RagentResult<LlmResponse> {
    let choice = body["choices"]
        .get(0)
        .ok_or_else(|| RagentError::Completion(format!("response has no choices: {body}")))?;
    let message = &choice["message"];
    let content = message["content"].as_str().unwrap_or_default().to_string();

    if let Some(tool_calls_json) = message["tool_calls"].as_array() {
        let tool_calls: Vec<ToolCall> = tool_calls_json
            .iter()
            .filter_map(|tc| {
                let id = tc["id"].as_str()?.to_string();
                let name = tc["function"]["name"].as_str()?.to_string();
                let raw = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let arguments = serde_json::from_str(raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
                Some(ToolCall {
                    id,
                    name,
                    arguments,
                })
            })
            .collect();

        if !tool_calls.is_empty() {
            return Ok(LlmResponse::ToolUse {
                content: if content.is_empty() {
                    None
                } else {
                    Some(content)
                },
                tool_calls,
            });
        }
    }

    let finish_reason = choice["finish_reason"].as_str().unwrap_or("stop");
    if finish_reason == "stop" {
        Ok(LlmResponse::Done(content))
    } else {
        Ok(LlmResponse::Text(content))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_text_response() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "4"}, "finish_reason": "stop"}]
        });
        assert_eq!(
            parse_openai_response(&body).unwrap(),
            LlmResponse::Done("4".to_string())
        );
    }

    #[test]
    fn test_parse_length_cutoff() {
        let body = json!({
            "choices": [{"message": {"content": "partial"}, "finish_reason": "length"}]
        });
        assert_eq!(
            parse_openai_response(&body).unwrap(),
            LlmResponse::Text("partial".to_string())
        );
    }

    #[test]
    fn test_parse_tool_calls() {
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "search_documents", "arguments": "{\"query\":\"vacation\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        });
        match parse_openai_response(&body).unwrap() {
            LlmResponse::ToolUse {
                content,
                tool_calls,
            } => {
                assert!(content.is_none());
                assert_eq!(tool_calls.len(), 1);
                assert_eq!(tool_calls[0].id, "call_abc");
                assert_eq!(tool_calls[0].arguments, json!({"query": "vacation"}));
            }
            other => panic!("expected tool use, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_malformed_arguments_kept_raw() {
        let body = json!({
            "choices": [{
                "message": {
                    "tool_calls": [{
                        "id": "c1",
                        "function": {"name": "search_documents", "arguments": "{not json"}
                    }]
                }
            }]
        });
        match parse_openai_response(&body).unwrap() {
            LlmResponse::ToolUse { tool_calls, .. } => {
                assert_eq!(tool_calls[0].arguments, json!("{not json"));
            }
            other => panic!("expected tool use, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_missing_choices() {
        let err = parse_openai_response(&json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, RagentError::Completion(_)));
    }

    #[test]
    fn test_encode_tool_round_messages() {
        let call = ToolCall {
            id: "call_1".to_string(),
            name: "search_documents".to_string(),
            arguments: json!({"query": "leave"}),
        };
        let assistant = encode_message(&Message::assistant_tool_calls("", vec![call]));
        assert_eq!(assistant["content"], serde_json::Value::Null);
        assert_eq!(assistant["tool_calls"][0]["function"]["arguments"], "{\"query\":\"leave\"}");

        let tool = encode_message(&Message::tool("call_1", "[Document 1 - hr.txt]"));
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "call_1");

        let system = encode_message(&Message::system("rules"));
        assert_eq!(system, json!({"role": "system", "content": "rules"}));
    }
}
