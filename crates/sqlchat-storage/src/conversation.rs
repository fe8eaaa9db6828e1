//! Append-only conversation log.
//!
//! Messages are never edited or removed. History order is
//! `(created_at, id)`: the autoincrement id is the insertion sequence and
//! decides ordering between messages written in the same millisecond.
//!
//! Timestamps are UTC text (`YYYY-MM-DD HH:MM:SS.SSS`), so rows written by
//! tools that rely on SQLite's `CURRENT_TIMESTAMP` default read back too.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use tracing::debug;

use sqlchat_core::error::SqlchatError;
use sqlchat_core::types::{Message, Sender};

use crate::db::Database;
use crate::migrations::ensure_conversation_tables;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Durable per-conversation message log.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    db: Arc<Database>,
}

impl ConversationStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append one message, registering the conversation on first use.
    ///
    /// The write lock is taken before the timestamp is read, so timestamp
    /// order agrees with id order across concurrent writers.
    pub fn append(
        &self,
        conversation_id: &str,
        sender: Sender,
        content: &str,
    ) -> Result<Message, SqlchatError> {
        self.db.with_conn(|conn| {
            ensure_conversation_tables(conn)?;

            let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
                .map_err(|e| SqlchatError::Storage(format!("Failed to begin append: {}", e)))?;
            let created_at = Utc::now();
            tx.execute(
                "INSERT OR IGNORE INTO conversations (conversation_id) VALUES (?1)",
                params![conversation_id],
            )
            .map_err(|e| SqlchatError::Storage(format!("Failed to register conversation: {}", e)))?;
            tx.execute(
                "INSERT INTO messages (conversation_id, sender, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    conversation_id,
                    sender.as_str(),
                    content,
                    created_at.format(TIMESTAMP_FORMAT).to_string()
                ],
            )
            .map_err(|e| SqlchatError::Storage(format!("Failed to append message: {}", e)))?;
            let id = tx.last_insert_rowid();
            tx.commit()
                .map_err(|e| SqlchatError::Storage(format!("Failed to commit append: {}", e)))?;

            debug!(conversation_id, sender = %sender, id, "Message appended");

            Ok(Message {
                id,
                conversation_id: conversation_id.to_string(),
                sender,
                content: content.to_string(),
                created_at: truncate_to_millis(created_at),
            })
        })
    }

    /// The most recent `limit` messages, oldest first.
    pub fn recent(&self, conversation_id: &str, limit: usize) -> Result<Vec<Message>, SqlchatError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.db.with_conn(|conn| {
            ensure_conversation_tables(conn)?;
            let mut messages = query_messages(
                conn,
                "SELECT id, conversation_id, sender, content, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
                params![conversation_id, limit as i64],
            )?;
            messages.reverse();
            Ok(messages)
        })
    }

    /// The full transcript of a conversation, oldest first.
    pub fn history(&self, conversation_id: &str) -> Result<Vec<Message>, SqlchatError> {
        self.db.with_conn(|conn| {
            ensure_conversation_tables(conn)?;
            query_messages(
                conn,
                "SELECT id, conversation_id, sender, content, created_at
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY created_at ASC, id ASC",
                params![conversation_id],
            )
        })
    }

    /// All known conversation ids, in order of first appearance.
    pub fn list_conversations(&self) -> Result<Vec<String>, SqlchatError> {
        self.db.with_conn(|conn| {
            ensure_conversation_tables(conn)?;
            let mut stmt = conn
                .prepare("SELECT conversation_id FROM conversations ORDER BY id ASC")
                .map_err(|e| SqlchatError::Storage(format!("Conversations query prepare: {}", e)))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| SqlchatError::Storage(format!("Conversations query: {}", e)))?;

            let mut ids = Vec::new();
            for row in rows {
                ids.push(row.map_err(|e| SqlchatError::Storage(e.to_string()))?);
            }
            Ok(ids)
        })
    }
}

fn query_messages(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Message>, SqlchatError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SqlchatError::Storage(format!("Messages query prepare: {}", e)))?;

    let rows = stmt
        .query_map(params, |row| {
            let id: i64 = row.get(0)?;
            let conversation_id: String = row.get(1)?;
            let sender: String = row.get(2)?;
            let content: String = row.get(3)?;
            let created_at: Value = row.get(4)?;
            Ok((id, conversation_id, sender, content, created_at))
        })
        .map_err(|e| SqlchatError::Storage(format!("Messages query: {}", e)))?;

    let mut messages = Vec::new();
    for row in rows {
        let (id, conversation_id, sender, content, created_at) =
            row.map_err(|e| SqlchatError::Storage(e.to_string()))?;
        messages.push(Message {
            id,
            conversation_id,
            sender: sender.parse()?,
            content,
            created_at: parse_created_at(created_at)?,
        });
    }
    Ok(messages)
}

/// Parse a stored timestamp. Accepts the text layouts SQLite produces (with
/// or without fractional seconds, space or `T` separator) and epoch
/// milliseconds.
fn parse_created_at(value: Value) -> Result<DateTime<Utc>, SqlchatError> {
    match value {
        Value::Text(text) => ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text.trim(), fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| SqlchatError::Storage(format!("Invalid message timestamp: {}", text))),
        Value::Integer(millis) => Utc
            .timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| SqlchatError::Storage(format!("Invalid message timestamp: {}", millis))),
        other => Err(SqlchatError::Storage(format!(
            "Invalid message timestamp type: {:?}",
            other.data_type()
        ))),
    }
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts.timestamp_millis())
        .single()
        .unwrap_or(ts)
}
