use ragent_core::{RagentError, RagentResult, ToolCall};
use ragent_memory::RetrievedChunk;
use serde::{Deserialize, Serialize};

/// Name of the document retrieval tool offered to the model.
pub const SEARCH_DOCUMENTS: &str = "search_documents";

/// Result count used when the model omits `num_results`.
pub const DEFAULT_NUM_RESULTS: usize = 3;

/// A tool as advertised to the completion model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name the model calls.
    pub name: String,
    /// What the tool does, shown to the model.
    pub description: String,
    /// JSON Schema of the arguments.
    pub parameters_schema: serde_json::Value,
}

impl ToolDescriptor {
    /// The `search_documents` tool.
    pub fn search_documents() -> Self {
        Self {
            name: SEARCH_DOCUMENTS.to_string(),
            description: "Search the company knowledge base for relevant information. Use this \
                          when the question is about company policies, products, procedures, or \
                          requires specific factual information from documents."
                .to_string(),
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to find relevant documents"
                    },
                    "num_results": {
                        "type": "integer",
                        "description": "Number of results to retrieve (default: 3)",
                        "default": DEFAULT_NUM_RESULTS
                    }
                },
                "required": ["query"]
            }),
        }
    }
}

/// A validated tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    /// Look up the `num_results` chunks nearest to `query`.
    SearchDocuments {
        /// Search text; never blank.
        query: String,
        /// At least 1; defaults to 3.
        num_results: usize,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchDocumentsArgs {
    query: String,
    #[serde(default = "default_num_results")]
    num_results: usize,
}

fn default_num_results() -> usize {
    DEFAULT_NUM_RESULTS
}

impl ToolRequest {
    /// Check a raw call against the schema of the tool it names.
    pub fn from_call(call: &ToolCall) -> RagentResult<Self> {
        match call.name.as_str() {
            SEARCH_DOCUMENTS => {
                let args: SearchDocumentsArgs = serde_json::from_value(call.arguments.clone())
                    .map_err(|e| {
                        RagentError::ToolArguments(format!("{SEARCH_DOCUMENTS}: {e}"))
                    })?;
                if args.query.trim().is_empty() {
                    return Err(RagentError::ToolArguments(format!(
                        "{SEARCH_DOCUMENTS}: query must not be empty"
                    )));
                }
                if args.num_results == 0 {
                    return Err(RagentError::ToolArguments(format!(
                        "{SEARCH_DOCUMENTS}: num_results must be at least 1"
                    )));
                }
                Ok(Self::SearchDocuments {
                    query: args.query,
                    num_results: args.num_results,
                })
            }
            other => Err(RagentError::ToolArguments(format!("unknown tool '{other}'"))),
        }
    }
}

/// Render retrieved chunks as the numbered, source-labelled block handed
/// back to the model.
pub fn format_search_results(results: &[RetrievedChunk]) -> String {
    if results.is_empty() {
        return "No relevant documents found.".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[Document {} - {}]\n{}\n", i + 1, r.source, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_descriptor_schema() {
        let tool = ToolDescriptor::search_documents();
        assert_eq!(tool.name, "search_documents");
        assert_eq!(tool.parameters_schema["required"], json!(["query"]));
        assert_eq!(tool.parameters_schema["properties"]["num_results"]["default"], 3);
    }

    #[test]
    fn test_parse_with_default_num_results() {
        let request =
            ToolRequest::from_call(&call("search_documents", json!({"query": "leave"}))).unwrap();
        assert_eq!(
            request,
            ToolRequest::SearchDocuments {
                query: "leave".to_string(),
                num_results: 3
            }
        );
    }

    #[test]
    fn test_parse_explicit_num_results() {
        let request = ToolRequest::from_call(&call(
            "search_documents",
            json!({"query": "leave", "num_results": 5}),
        ))
        .unwrap();
        assert!(matches!(
            request,
            ToolRequest::SearchDocuments { num_results: 5, .. }
        ));
    }

    #[test]
    fn test_rejects_bad_arguments() {
        let cases = [
            json!({}),
            json!({"query": 42}),
            json!({"query": "x", "num_results": "three"}),
            json!({"query": "x", "num_results": -1}),
            json!({"query": "x", "num_results": 0}),
            json!({"query": "   "}),
            json!({"query": "x", "filter": "y"}),
            json!("not an object"),
        ];
        for args in cases {
            let err = ToolRequest::from_call(&call("search_documents", args.clone())).unwrap_err();
            assert!(matches!(err, RagentError::ToolArguments(_)), "{args}");
        }
    }

    #[test]
    fn test_rejects_unknown_tool() {
        let err = ToolRequest::from_call(&call("delete_everything", json!({}))).unwrap_err();
        assert!(err.to_string().contains("delete_everything"));
    }

    #[test]
    fn test_format_search_results() {
        let results = vec![
            RetrievedChunk {
                content: "Fifteen days of leave.".to_string(),
                source: "hr.txt".to_string(),
                chunk_index: 0,
                distance: 0.1,
            },
            RetrievedChunk {
                content: "Receipts within 30 days.".to_string(),
                source: "finance.txt".to_string(),
                chunk_index: 2,
                distance: 0.4,
            },
        ];
        assert_eq!(
            format_search_results(&results),
            "[Document 1 - hr.txt]\nFifteen days of leave.\n\n[Document 2 - finance.txt]\nReceipts within 30 days.\n"
        );
        assert_eq!(format_search_results(&[]), "No relevant documents found.");
    }
}
