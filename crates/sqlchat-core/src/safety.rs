//! Read-only gate for generated SQL.
//!
//! Every statement produced by the completion service passes through
//! [`validate`] before it reaches the dataset store. The gate accepts a single
//! `SELECT` and rejects any statement mentioning a write or schema keyword.
//!
//! This is a keyword denylist, not a SQL parser. A forbidden keyword inside a
//! string literal or comment is rejected just like a real one, and an
//! obfuscation the word-boundary match cannot see is not caught. Both are
//! known limitations of the approach.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Keywords that may not appear anywhere in an accepted statement.
pub const FORBIDDEN_KEYWORDS: [&str; 8] = [
    "insert", "update", "delete", "drop", "alter", "create", "attach", "pragma",
];

static FORBIDDEN_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    FORBIDDEN_KEYWORDS
        .iter()
        .map(|kw| {
            let re = Regex::new(&format!(r"(?i)\b{}\b", kw)).expect("Invalid keyword regex");
            (*kw, re)
        })
        .collect()
});

/// Why a candidate statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsafeQuery {
    #[error("Only SELECT queries are allowed (not a SELECT)")]
    NotSelect,
    #[error("Forbidden keyword detected in SQL: {0}")]
    ForbiddenKeyword(String),
}

/// A statement that passed [`validate`].
///
/// Holds the candidate text exactly as it was submitted. The only way to
/// obtain one is through validation, so executors can take `&SafeSql` and
/// know the gate has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeSql(String);

impl SafeSql {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SafeSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SafeSql {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check that `candidate` is a single read-only `SELECT`.
///
/// Pure: no I/O and no state. Validating the text of an already validated
/// statement returns an equal `SafeSql`.
pub fn validate(candidate: &str) -> Result<SafeSql, UnsafeQuery> {
    let normalized = candidate.trim().to_lowercase();
    if !normalized.starts_with("select") {
        return Err(UnsafeQuery::NotSelect);
    }

    for (keyword, pattern) in FORBIDDEN_PATTERNS.iter() {
        if pattern.is_match(&normalized) {
            return Err(UnsafeQuery::ForbiddenKeyword((*keyword).to_string()));
        }
    }

    Ok(SafeSql(candidate.to_string()))
}
