//! Lexical extraction of SQL from completion text.
//!
//! No validation happens here; the safety gate runs downstream.

use std::sync::LazyLock;

use regex::Regex;

static SQL_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```sql\s*(.*?)```").expect("Invalid sql fence regex"));
static ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("Invalid fence regex"));
static SQL_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^sql\s*[:\-]\s*").expect("Invalid label regex"));

/// Pull the candidate statement out of a completion reply.
///
/// First match wins:
/// 1. the first fenced block tagged `sql` (any case);
/// 2. the first fenced block of any kind;
/// 3. the whole reply with a leading `sql:` / `sql -` label removed.
///
/// The result is trimmed.
pub fn extract_sql(raw: &str) -> String {
    if let Some(caps) = SQL_FENCE.captures(raw) {
        return caps[1].trim().to_string();
    }
    if let Some(caps) = ANY_FENCE.captures(raw) {
        return caps[1].trim().to_string();
    }
    SQL_LABEL.replace(raw, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_tagged_fence() {
        assert_eq!(extract_sql("```sql\nSELECT 1\n```"), "SELECT 1");
    }

    #[test]
    fn test_untagged_fence_inside_prose() {
        assert_eq!(
            extract_sql("Here is the query: ```SELECT 2``` hope it helps"),
            "SELECT 2"
        );
    }

    #[test]
    fn test_sql_label_stripped() {
        assert_eq!(extract_sql("sql: SELECT 3"), "SELECT 3");
        assert_eq!(extract_sql("SQL - SELECT 3"), "SELECT 3");
        assert_eq!(extract_sql("Sql:SELECT 3"), "SELECT 3");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(extract_sql("SELECT 4"), "SELECT 4");
        assert_eq!(extract_sql("  SELECT 4\n"), "SELECT 4");
    }

    #[test]
    fn test_tag_is_case_insensitive() {
        assert_eq!(extract_sql("```SQL\nSELECT 5\n```"), "SELECT 5");
        assert_eq!(extract_sql("```Sql SELECT 5```"), "SELECT 5");
    }

    #[test]
    fn test_first_sql_fence_wins() {
        let raw = "Option A:\n```sql\nSELECT a FROM t\n```\nOption B:\n```sql\nSELECT b FROM t\n```";
        assert_eq!(extract_sql(raw), "SELECT a FROM t");
    }

    #[test]
    fn test_sql_fence_preferred_over_earlier_untagged_fence() {
        let raw = "```\nnot this\n```\nbut\n```sql\nSELECT 6\n```";
        assert_eq!(extract_sql(raw), "SELECT 6");
    }

    #[test]
    fn test_multiline_statement_preserved() {
        let raw = "```sql\nSELECT order_id,\n       price\nFROM order_items\n```";
        assert_eq!(extract_sql(raw), "SELECT order_id,\n       price\nFROM order_items");
    }

    #[test]
    fn test_label_only_at_start() {
        assert_eq!(
            extract_sql("SELECT 'sql: x' AS s"),
            "SELECT 'sql: x' AS s"
        );
    }

    #[test]
    fn test_unterminated_fence_falls_through() {
        assert_eq!(extract_sql("```sql\nSELECT 7"), "```sql\nSELECT 7");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(extract_sql(""), "");
    }
}
