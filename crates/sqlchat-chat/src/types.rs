//! Request, response, and prompt types for the query pipeline.

use serde::{Deserialize, Serialize};

use sqlchat_core::types::{QueryResult, Sender};

/// Role of a message sent to the completion service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl From<Sender> for Role {
    fn from(sender: Sender) -> Self {
        match sender {
            Sender::User => Role::User,
            Sender::Assistant => Role::Assistant,
        }
    }
}

/// One entry of the message sequence sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    pub prompt: String,
    /// Existing conversation to continue. A new id is generated when absent.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Row cap appended as `LIMIT n`. Falls back to the configured default;
    /// zero or negative disables the cap.
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Successful outcome of one query cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub conversation_id: String,
    pub sql: String,
    pub result: QueryResult,
    pub rows_count: usize,
}
