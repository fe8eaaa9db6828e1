//! Route handler functions for all API endpoints.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use sqlchat_chat::{QueryRequest, QueryResponse};
use sqlchat_core::types::Sender;

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    pub sender: Sender,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub conversation_id: String,
    pub messages: Vec<MessageView>,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /query - answer a natural-language question with SQL and its rows.
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let response = state.orchestrator.handle(request).await?;
    info!(
        conversation_id = %response.conversation_id,
        rows = response.rows_count,
        "POST /query"
    );
    Ok(Json(response))
}

/// GET /health - liveness plus the active completion provider.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        provider: state.orchestrator.provider().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /conversations - ids of every known conversation.
pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let conversations = state.store.list_conversations()?;
    Ok(Json(ConversationsResponse { conversations }))
}

/// GET /conversations/{id}/messages - full transcript, oldest first.
///
/// Unknown ids yield an empty list.
pub async fn conversation_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let messages = state
        .store
        .history(&conversation_id)?
        .into_iter()
        .map(|m| MessageView {
            sender: m.sender,
            content: m.content,
            created_at: m.created_at,
        })
        .collect();

    Ok(Json(MessagesResponse {
        conversation_id,
        messages,
    }))
}
