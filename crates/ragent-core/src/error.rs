use thiserror::Error;

/// A convenience `Result` alias using [`RagentError`].
pub type RagentResult<T> = Result<T, RagentError>;

/// Top-level error type for Ragent.
///
/// Local, recoverable conditions (an empty index, an expired session, one
/// unreadable source file) are not represented here: they are absorbed where
/// they happen. Everything below is surfaced to the caller.
#[derive(Error, Debug)]
pub enum RagentError {
    /// Invalid or incomplete configuration. Fatal at startup.
    #[error("Config error: {0}")]
    Config(String),

    /// A vector's length disagrees with the index's fixed dimension.
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch {
        /// The dimension fixed by the first ingested batch.
        expected: usize,
        /// The length of the offending vector.
        actual: usize,
    },

    /// A vector index operation failed (persistence, corrupt state).
    #[error("Index error: {0}")]
    Index(String),

    /// The embedding capability failed.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The completion capability failed or timed out.
    #[error("Completion error: {0}")]
    Completion(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A tool call named an unknown tool or carried arguments that do not
    /// match the tool's schema.
    #[error("Invalid tool call: {0}")]
    ToolArguments(String),

    /// A source document could not be read during ingestion.
    #[error("Document load error: {0}")]
    DocumentLoad(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagentError {
    /// Returns true for failures of an external capability (embedder,
    /// completer, or the HTTP transport underneath them).
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            RagentError::Embedding(_) | RagentError::Completion(_) | RagentError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = RagentError::DimensionMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: index expects 4, got 3");
    }

    #[test]
    fn test_is_external() {
        assert!(RagentError::Embedding("down".into()).is_external());
        assert!(RagentError::Completion("timeout".into()).is_external());
        assert!(RagentError::Http("502".into()).is_external());
        assert!(!RagentError::Config("missing key".into()).is_external());
        assert!(!RagentError::Index("corrupt".into()).is_external());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RagentError = io.into();
        assert!(matches!(err, RagentError::Io(_)));
    }
}
