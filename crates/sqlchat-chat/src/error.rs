//! Error types for the query pipeline.

use sqlchat_core::error::SqlchatError;
use sqlchat_core::safety::UnsafeQuery;

use crate::completion::CompletionError;

/// Errors from one query cycle. None of them are retried.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The prompt was empty after trimming. The only client-side error.
    #[error("Empty prompt")]
    EmptyPrompt,
    /// The generated statement failed the read-only gate.
    #[error(transparent)]
    Unsafe(#[from] UnsafeQuery),
    /// The dataset store rejected the statement.
    #[error("{0}")]
    Execution(String),
    /// The completion service was unreachable or returned an error.
    #[error("Completion service call failed: {0}")]
    Upstream(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl QueryError {
    /// Whether the caller, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, QueryError::EmptyPrompt)
    }
}

impl From<SqlchatError> for QueryError {
    fn from(err: SqlchatError) -> Self {
        match err {
            SqlchatError::Execution(msg) => QueryError::Execution(msg),
            other => QueryError::Storage(other.to_string()),
        }
    }
}

impl From<CompletionError> for QueryError {
    fn from(err: CompletionError) -> Self {
        QueryError::Upstream(err.to_string())
    }
}
