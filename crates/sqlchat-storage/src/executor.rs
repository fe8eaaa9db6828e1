//! Runs validated statements against the dataset tables.

use std::sync::Arc;

use rusqlite::types::ValueRef;
use serde_json::Value;
use tracing::debug;

use sqlchat_core::error::SqlchatError;
use sqlchat_core::safety::SafeSql;
use sqlchat_core::types::{QueryResult, Row};

use crate::db::Database;

/// Executes [`SafeSql`] over a read-only connection and materializes the
/// full result set.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    db: Arc<Database>,
}

impl QueryExecutor {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Execute a statement and collect every row.
    ///
    /// Any error reported by SQLite (syntax, unknown table or column) is
    /// returned as [`SqlchatError::Execution`] with the engine's message.
    /// The connection is released before this returns, on success or failure.
    pub fn execute(&self, statement: &SafeSql) -> Result<QueryResult, SqlchatError> {
        let result = self.db.with_read_only_conn(|conn| {
            let mut stmt = conn
                .prepare(statement.as_str())
                .map_err(|e| SqlchatError::Execution(e.to_string()))?;

            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();

            let mut rows = stmt
                .query([])
                .map_err(|e| SqlchatError::Execution(e.to_string()))?;

            let mut out = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| SqlchatError::Execution(e.to_string()))?
            {
                let mut record = Row::new();
                for (idx, name) in columns.iter().enumerate() {
                    let value = row
                        .get_ref(idx)
                        .map_err(|e| SqlchatError::Execution(e.to_string()))?;
                    record.insert(name.clone(), to_json(value));
                }
                out.push(record);
            }

            Ok(QueryResult { columns, rows: out })
        })?;

        debug!(rows = result.rows.len(), "Statement executed");
        Ok(result)
    }
}

/// Map a SQLite value to JSON. BLOBs become lowercase hex strings and
/// non-finite reals become `null`.
fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}
