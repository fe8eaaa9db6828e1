//! Database schema migrations.
//!
//! The conversation log lives in two tables, `conversations` and `messages`,
//! next to the dataset tables. Migrations are tracked in `schema_migrations`.
//!
//! `messages.created_at` holds UTC text in SQLite's `CURRENT_TIMESTAMP` layout
//! with a millisecond suffix (`YYYY-MM-DD HH:MM:SS.SSS`). Databases created by
//! older tools with plain `CURRENT_TIMESTAMP` defaults share the table and
//! sort correctly alongside new rows.

use rusqlite::Connection;
use tracing::info;

use sqlchat_core::error::SqlchatError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), SqlchatError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| SqlchatError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| SqlchatError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: conversation_log");
    }
    if current_version < 2 {
        apply_v2(conn)?;
        info!("Applied migration v2: text_timestamps");
    }

    Ok(())
}

/// Create the conversation tables if they are missing.
///
/// Safe to call on every write; the store uses it so that a database file
/// created outside the migration path heals itself on first use.
pub fn ensure_conversation_tables(conn: &Connection) -> Result<(), SqlchatError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS conversations (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS messages (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id TEXT NOT NULL,
            sender          TEXT NOT NULL
                            CHECK (sender IN ('user', 'assistant')),
            content         TEXT NOT NULL,
            created_at      TEXT NOT NULL
                            DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            FOREIGN KEY (conversation_id) REFERENCES conversations(conversation_id)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_conversation
            ON messages (conversation_id, created_at DESC, id DESC);
        ",
    )
    .map_err(|e| SqlchatError::Storage(format!("Failed to create conversation tables: {}", e)))
}

/// Version 1: conversation log.
fn apply_v1(conn: &Connection) -> Result<(), SqlchatError> {
    ensure_conversation_tables(conn)?;
    conn.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (1, 'conversation_log')",
        [],
    )
    .map_err(|e| SqlchatError::Storage(format!("Failed to record migration v1: {}", e)))?;
    Ok(())
}

/// Version 2: rewrite epoch-millisecond timestamps as text.
fn apply_v2(conn: &Connection) -> Result<(), SqlchatError> {
    ensure_conversation_tables(conn)?;
    conn.execute_batch(
        "UPDATE messages
            SET created_at = strftime('%Y-%m-%d %H:%M:%f', created_at / 1000.0, 'unixepoch')
          WHERE typeof(created_at) = 'integer';
         INSERT INTO schema_migrations (version, name) VALUES (2, 'text_timestamps');",
    )
    .map_err(|e| SqlchatError::Storage(format!("Failed to apply migration v2: {}", e)))
}
