//! Query orchestrator: one request/response cycle.
//!
//! `Received -> Logged(user) -> Composed -> Completed -> LimitApplied ->
//! Validated -> Executed -> Logged(assistant x2) -> Responded`.
//!
//! Any stage may fail. A failure stops the cycle and is returned to the
//! caller; messages already appended stay in the log.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sqlchat_core::config::QueryConfig;
use sqlchat_core::safety::validate;
use sqlchat_core::types::Sender;
use sqlchat_storage::{ConversationStore, QueryExecutor};

use crate::completion::ArcCompletion;
use crate::error::QueryError;
use crate::extract::extract_sql;
use crate::prompt::PromptComposer;
use crate::types::{QueryRequest, QueryResponse};

static LIMIT_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bLIMIT\b").expect("Invalid limit regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    LogUser,
    Compose,
    Complete,
    Validate,
    Execute,
    LogAssistant,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::LogUser => "log_user",
            Stage::Compose => "compose",
            Stage::Complete => "complete",
            Stage::Validate => "validate",
            Stage::Execute => "execute",
            Stage::LogAssistant => "log_assistant",
        };
        f.write_str(name)
    }
}

/// Wires the conversation log, prompt composer, completion service, safety
/// gate, and executor into a single pipeline.
pub struct QueryOrchestrator {
    store: ConversationStore,
    executor: QueryExecutor,
    composer: PromptComposer,
    completion: ArcCompletion,
    default_limit: u32,
}

impl QueryOrchestrator {
    pub fn new(
        store: ConversationStore,
        executor: QueryExecutor,
        completion: ArcCompletion,
        config: &QueryConfig,
    ) -> Self {
        Self {
            store,
            executor,
            composer: PromptComposer::new(config.history_turns),
            completion,
            default_limit: config.default_limit,
        }
    }

    /// Name of the active completion provider.
    pub fn provider(&self) -> &str {
        self.completion.name()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Run one question through the pipeline.
    pub async fn handle(&self, request: QueryRequest) -> Result<QueryResponse, QueryError> {
        if request.prompt.trim().is_empty() {
            return Err(QueryError::EmptyPrompt);
        }

        let conversation_id = request
            .conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_conversation_id);
        let limit = request.limit.unwrap_or(i64::from(self.default_limit));
        let fail = |stage: Stage, err: QueryError| {
            warn!(conversation_id = %conversation_id, stage = %stage, error = %err, "Query failed");
            err
        };

        let user_message = self
            .store
            .append(&conversation_id, Sender::User, &request.prompt)
            .map_err(|e| fail(Stage::LogUser, e.into()))?;
        debug!(conversation_id = %conversation_id, message_id = user_message.id, "User message logged");

        let messages = self
            .composer
            .compose_for(
                &self.store,
                &request.prompt,
                Some(&conversation_id),
                Some(user_message.id),
            )
            .map_err(|e| fail(Stage::Compose, e.into()))?;
        debug!(conversation_id = %conversation_id, messages = messages.len(), "Prompt composed");

        let raw = self
            .completion
            .complete(&messages)
            .await
            .map_err(|e| fail(Stage::Complete, e.into()))?;

        debug!(conversation_id = %conversation_id, "Completion received");

        let candidate = apply_limit(&extract_sql(&raw), limit);
        let safe_sql = validate(&candidate).map_err(|e| fail(Stage::Validate, e.into()))?;
        debug!(conversation_id = %conversation_id, sql = %safe_sql, "SQL validated");

        let result = self
            .executor
            .execute(&safe_sql)
            .map_err(|e| fail(Stage::Execute, e.into()))?;
        let rows_count = result.row_count();

        self.store
            .append(&conversation_id, Sender::Assistant, safe_sql.as_str())
            .map_err(|e| fail(Stage::LogAssistant, e.into()))?;
        self.store
            .append(
                &conversation_id,
                Sender::Assistant,
                &format!("Returned {} rows.", rows_count),
            )
            .map_err(|e| fail(Stage::LogAssistant, e.into()))?;

        info!(conversation_id = %conversation_id, rows = rows_count, "Query answered");

        Ok(QueryResponse {
            conversation_id,
            sql: safe_sql.into_inner(),
            result,
            rows_count,
        })
    }
}

/// Cap a statement's row count.
///
/// Surrounding whitespace and trailing semicolons are always removed. When
/// the statement has no `LIMIT` keyword and `limit` is positive,
/// ` LIMIT <limit>` is appended.
pub fn apply_limit(sql: &str, limit: i64) -> String {
    let stripped = sql.trim().trim_end_matches(';').trim_end();
    if limit > 0 && !LIMIT_KEYWORD.is_match(stripped) {
        format!("{} LIMIT {}", stripped, limit)
    } else {
        stripped.to_string()
    }
}

/// Fresh conversation id: `conv_` followed by eight lowercase hex digits.
pub fn new_conversation_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("conv_{}", &hex[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use sqlchat_core::error::SqlchatError;
    use sqlchat_storage::Database;

    use crate::completion::ScriptedCompletion;
    use crate::types::Role;

    fn seeded_db() -> Arc<Database> {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE orders (order_id TEXT, order_status TEXT);
                 INSERT INTO orders VALUES ('o1', 'delivered');
                 INSERT INTO orders VALUES ('o2', 'shipped');
                 INSERT INTO orders VALUES ('o3', 'delivered');",
            )
            .map_err(|e| SqlchatError::Storage(e.to_string()))
        })
        .unwrap();
        Arc::new(db)
    }

    fn make_orchestrator(provider: Arc<ScriptedCompletion>) -> QueryOrchestrator {
        let db = seeded_db();
        QueryOrchestrator::new(
            ConversationStore::new(Arc::clone(&db)),
            QueryExecutor::new(db),
            provider,
            &QueryConfig::default(),
        )
    }

    fn request(prompt: &str, conversation_id: Option<&str>, limit: Option<i64>) -> QueryRequest {
        QueryRequest {
            prompt: prompt.to_string(),
            conversation_id: conversation_id.map(String::from),
            limit,
        }
    }

    // ---- apply_limit ----

    #[test]
    fn test_apply_limit_appends_when_missing() {
        assert_eq!(
            apply_limit("SELECT * FROM orders", 50),
            "SELECT * FROM orders LIMIT 50"
        );
    }

    #[test]
    fn test_apply_limit_respects_existing_limit() {
        assert_eq!(
            apply_limit("SELECT * FROM orders LIMIT 10", 50),
            "SELECT * FROM orders LIMIT 10"
        );
        assert_eq!(
            apply_limit("select * from orders limit 10", 50),
            "select * from orders limit 10"
        );
    }

    #[test]
    fn test_apply_limit_strips_trailing_semicolon() {
        assert_eq!(apply_limit("SELECT 1;", 5), "SELECT 1 LIMIT 5");
        assert_eq!(apply_limit("  SELECT 1 ;;  ", 5), "SELECT 1 LIMIT 5");
        assert_eq!(apply_limit("SELECT 1 LIMIT 2;", 5), "SELECT 1 LIMIT 2");
    }

    #[test]
    fn test_apply_limit_non_positive_disables_cap() {
        assert_eq!(apply_limit("SELECT 1", 0), "SELECT 1");
        assert_eq!(apply_limit("SELECT 1", -3), "SELECT 1");
    }

    #[test]
    fn test_apply_limit_word_boundary() {
        assert_eq!(
            apply_limit("SELECT credit_limited FROM t", 5),
            "SELECT credit_limited FROM t LIMIT 5"
        );
    }

    // ---- new_conversation_id ----

    #[test]
    fn test_new_conversation_id_format() {
        let id = new_conversation_id();
        assert_eq!(id.len(), 13);
        assert!(id.starts_with("conv_"));
        assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, new_conversation_id());
    }

    // ---- handle ----

    #[tokio::test]
    async fn test_handle_happy_path_new_conversation() {
        let provider = Arc::new(
            ScriptedCompletion::new()
                .with_reply("```sql\nSELECT order_id FROM orders ORDER BY order_id;\n```"),
        );
        let orch = make_orchestrator(Arc::clone(&provider));

        let resp = orch
            .handle(request("List orders", None, Some(2)))
            .await
            .unwrap();

        assert!(resp.conversation_id.starts_with("conv_"));
        assert_eq!(resp.sql, "SELECT order_id FROM orders ORDER BY order_id LIMIT 2");
        assert_eq!(resp.rows_count, 2);
        assert_eq!(resp.rows_count, resp.result.rows.len());
        assert_eq!(resp.result.columns, vec!["order_id"]);
        assert_eq!(resp.result.rows[0]["order_id"], json!("o1"));

        let history = orch.store().history(&resp.conversation_id).unwrap();
        let logged: Vec<(Sender, &str)> = history
            .iter()
            .map(|m| (m.sender, m.content.as_str()))
            .collect();
        assert_eq!(
            logged,
            vec![
                (Sender::User, "List orders"),
                (Sender::Assistant, "SELECT order_id FROM orders ORDER BY order_id LIMIT 2"),
                (Sender::Assistant, "Returned 2 rows."),
            ]
        );
    }

    #[tokio::test]
    async fn test_default_limit_from_config() {
        let provider = Arc::new(ScriptedCompletion::new().with_reply("SELECT * FROM orders"));
        let orch = make_orchestrator(provider);
        let resp = orch.handle(request("all orders", None, None)).await.unwrap();
        assert_eq!(resp.sql, "SELECT * FROM orders LIMIT 100");
        assert_eq!(resp.rows_count, 3);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_without_logging() {
        let provider = Arc::new(ScriptedCompletion::new());
        let orch = make_orchestrator(Arc::clone(&provider));

        let err = orch
            .handle(request("   ", Some("conv_empty"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::EmptyPrompt));
        assert!(orch.store().history("conv_empty").unwrap().is_empty());
        assert!(provider.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_sql_fails_and_keeps_user_message() {
        let provider = Arc::new(
            ScriptedCompletion::new().with_reply("SELECT * FROM orders; DROP TABLE orders"),
        );
        let orch = make_orchestrator(provider);

        let err = orch
            .handle(request("delete everything", Some("conv_x"), None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Unsafe(sqlchat_core::UnsafeQuery::ForbiddenKeyword(ref k)) if k == "drop"
        ));

        let history = orch.store().history("conv_x").unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender, Sender::User);
    }

    #[tokio::test]
    async fn test_execution_error_carries_engine_message() {
        let provider = Arc::new(ScriptedCompletion::new().with_reply("SELECT * FROM nope"));
        let orch = make_orchestrator(provider);

        let err = orch
            .handle(request("bad table", Some("conv_e"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Execution(ref m) if m.contains("no such table")));
        assert_eq!(orch.store().history("conv_e").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_reported() {
        let provider = Arc::new(ScriptedCompletion::new().with_failure("connection reset"));
        let orch = make_orchestrator(provider);

        let err = orch
            .handle(request("anything", Some("conv_u"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Upstream(ref m) if m.contains("connection reset")));
        assert_eq!(orch.store().history("conv_u").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_follow_up_replays_prior_turns() {
        let provider = Arc::new(
            ScriptedCompletion::new()
                .with_reply("SELECT order_id FROM orders")
                .with_reply("SELECT order_id FROM orders WHERE order_status = 'delivered'"),
        );
        let orch = make_orchestrator(Arc::clone(&provider));

        let first = orch.handle(request("List orders", None, None)).await.unwrap();
        let second = orch
            .handle(request(
                "only the delivered ones",
                Some(&first.conversation_id),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);
        assert_eq!(second.rows_count, 2);

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].len(), 2);

        let follow_up = &requests[1];
        let turns: Vec<(Role, &str)> = follow_up
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(turns.len(), 5);
        assert_eq!(turns[0].0, Role::System);
        assert_eq!(turns[1], (Role::User, "List orders"));
        assert_eq!(turns[2], (Role::Assistant, "SELECT order_id FROM orders LIMIT 100"));
        assert_eq!(turns[3], (Role::Assistant, "Returned 3 rows."));
        assert_eq!(turns[4].0, Role::User);
        assert!(turns[4].1.starts_with("only the delivered ones"));
    }

    #[tokio::test]
    async fn test_blank_conversation_id_replaced() {
        let provider = Arc::new(ScriptedCompletion::new());
        let orch = make_orchestrator(provider);
        let resp = orch.handle(request("one", Some("  "), None)).await.unwrap();
        assert!(resp.conversation_id.starts_with("conv_"));
    }

    #[test]
    fn test_provider_name() {
        let orch = make_orchestrator(Arc::new(ScriptedCompletion::new()));
        assert_eq!(orch.provider(), "scripted");
    }
}
