//! Repository functions over a `rusqlite::Connection`.
//!
//! Each submodule owns one family of tables. Functions take `&Connection` and
//! return [`StoreResult`]. Lists come back newest-first.
//!
//! Records whose stored JSON or enum text no longer parses are
//! [`StoreError::Malformed`]: single-record reads propagate that error, list
//! reads skip the record and log a warning.

pub mod branches;
pub mod breadcrumbs;
pub mod goals;
pub mod projects;
pub mod sessions;

use rusqlite::types::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// Accumulates optional `WHERE` clauses and their positional parameters.
#[derive(Debug, Default)]
pub(crate) struct Filter {
    clauses: Vec<&'static str>,
    params: Vec<Value>,
}

impl Filter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add `clause` (with a single `?`) when `value` is present.
    pub(crate) fn opt(mut self, clause: &'static str, value: Option<impl Into<Value>>) -> Self {
        if let Some(v) = value {
            self.clauses.push(clause);
            self.params.push(v.into());
        }
        self
    }

    /// Add `clause` unconditionally.
    pub(crate) fn with(mut self, clause: &'static str, value: impl Into<Value>) -> Self {
        self.clauses.push(clause);
        self.params.push(value.into());
        self
    }

    /// `" WHERE a = ? AND b = ?"`, or empty.
    pub(crate) fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Parameters with a trailing `LIMIT` value appended.
    pub(crate) fn params_with_limit(mut self, limit: usize) -> Vec<Value> {
        self.params.push(Value::Integer(limit as i64));
        self.params
    }

    pub(crate) fn into_params(self) -> Vec<Value> {
        self.params
    }
}

/// `%text%` for a `LIKE ? ESCAPE '\'` clause, with the user's text matched
/// literally.
pub(crate) fn contains_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Keep well-formed records, warn about and drop malformed ones. Driver
/// errors still abort.
pub(crate) fn collect_lenient<T>(rows: Vec<StoreResult<T>>) -> StoreResult<Vec<T>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        match row {
            Ok(v) => out.push(v),
            Err(StoreError::Malformed { kind, id, reason }) => {
                warn!(kind, id = %id, reason = %reason, "skipping malformed record");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

/// Decode a JSON column, attributing failure to the owning record.
pub(crate) fn decode_json<T: DeserializeOwned>(
    kind: &'static str,
    id: &str,
    raw: &str,
) -> StoreResult<T> {
    serde_json::from_str(raw).map_err(|e| StoreError::malformed(kind, id, e))
}

pub(crate) fn encode_json<T: Serialize>(kind: &'static str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode { kind, source })
}

/// Parse an enum stored as text.
pub(crate) fn parse_enum<T: std::str::FromStr<Err = String>>(
    kind: &'static str,
    id: &str,
    raw: &str,
) -> StoreResult<T> {
    raw.parse().map_err(|e: String| StoreError::malformed(kind, id, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_builds_where_clause() {
        let f = Filter::new()
            .opt("project_id = ?", Some("p1".to_string()))
            .opt("session_id = ?", None::<String>)
            .with("is_resolved = ?", 0i64);
        assert_eq!(f.where_sql(), " WHERE project_id = ? AND is_resolved = ?");
        assert_eq!(f.params_with_limit(5).len(), 3);
    }

    #[test]
    fn contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("a_b"), r"%a\_b%");
        assert_eq!(contains_pattern("100%"), r"%100\%%");
        assert_eq!(contains_pattern(r"c:\tmp"), r"%c:\\tmp%");
    }

    #[test]
    fn empty_filter_has_no_where() {
        assert_eq!(Filter::new().where_sql(), "");
    }

    #[test]
    fn lenient_collect_skips_malformed_only() {
        let rows = vec![
            Ok(1),
            Err(StoreError::malformed("goal", "g1", "bad json")),
            Ok(3),
        ];
        assert_eq!(collect_lenient(rows).unwrap(), vec![1, 3]);

        let rows: Vec<StoreResult<i32>> =
            vec![Ok(1), Err(StoreError::Database(rusqlite::Error::InvalidQuery))];
        assert!(collect_lenient(rows).is_err());
    }
}
