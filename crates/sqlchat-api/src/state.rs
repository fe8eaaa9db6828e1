//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use sqlchat_chat::QueryOrchestrator;
use sqlchat_storage::ConversationStore;

/// Shared application state, cloned into every handler task.
#[derive(Clone)]
pub struct AppState {
    /// The query pipeline.
    pub orchestrator: Arc<QueryOrchestrator>,
    /// Conversation log, for the read-only history endpoints.
    pub store: ConversationStore,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(orchestrator: QueryOrchestrator) -> Self {
        let store = orchestrator.store().clone();
        Self {
            orchestrator: Arc::new(orchestrator),
            store,
            start_time: Instant::now(),
        }
    }
}
