//! SQL value types and the per-column conversion applied on write.
//!
//! Source values mirror SQLite's storage classes. They are written to
//! PostgreSQL as text parameters and cast server-side to the destination
//! column type, so a value only needs a canonical text rendering here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A single cell read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL.
    Null,

    /// Boolean produced by boolean-column coercion.
    Bool(bool),

    /// SQLite INTEGER storage class.
    Integer(i64),

    /// SQLite REAL storage class.
    Real(f64),

    /// SQLite TEXT storage class.
    Text(String),

    /// SQLite BLOB storage class.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Truthiness of a non-null value: zero numbers and empty text/blobs are
    /// false, everything else is true. NULL has no truth value.
    #[must_use]
    pub fn truthiness(&self) -> Option<bool> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(*b),
            SqlValue::Integer(n) => Some(*n != 0),
            SqlValue::Real(f) => Some(*f != 0.0),
            SqlValue::Text(s) => Some(!s.is_empty()),
            SqlValue::Blob(b) => Some(!b.is_empty()),
        }
    }

    /// Render as PostgreSQL text input, or `None` for NULL.
    ///
    /// The rendering is what the destination type's input function accepts:
    /// `t`/`f` for booleans and `\x`-prefixed hex for bytea.
    #[must_use]
    pub fn to_pg_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(if *b { "t" } else { "f" }.to_string()),
            SqlValue::Integer(n) => Some(n.to_string()),
            SqlValue::Real(f) => Some(format_real(*f)),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Blob(b) => Some(format!("\\x{}", hex::encode(b))),
        }
    }
}

fn format_real(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        f.to_string()
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Column names whose integer 0/1 values are written as booleans.
#[derive(Debug, Clone, Default)]
pub struct BooleanColumns {
    names: HashSet<String>,
}

impl BooleanColumns {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.names.contains(column)
    }
}

/// Map a value through truthiness, keeping NULL.
pub fn coerce_bool(value: SqlValue) -> SqlValue {
    match value.truthiness() {
        Some(b) => SqlValue::Bool(b),
        None => SqlValue::Null,
    }
}

/// A row of values in positional order.
pub type Row = Vec<SqlValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_bool_maps_zero_one_null() {
        assert_eq!(
            coerce_bool(SqlValue::Integer(0)),
            SqlValue::Bool(false)
        );
        assert_eq!(
            coerce_bool(SqlValue::Integer(1)),
            SqlValue::Bool(true)
        );
        assert_eq!(coerce_bool(SqlValue::Null), SqlValue::Null);
    }

    #[test]
    fn test_coerce_bool_any_nonzero_is_true() {
        assert_eq!(
            coerce_bool(SqlValue::Integer(-7)),
            SqlValue::Bool(true)
        );
        assert_eq!(
            coerce_bool(SqlValue::Real(0.0)),
            SqlValue::Bool(false)
        );
        assert_eq!(
            coerce_bool(SqlValue::Real(0.5)),
            SqlValue::Bool(true)
        );
    }

    #[test]
    fn test_coerce_bool_text_follows_truthiness() {
        assert_eq!(
            coerce_bool(SqlValue::Text(String::new())),
            SqlValue::Bool(false)
        );
        // Non-empty text is truthy even when it spells zero.
        assert_eq!(
            coerce_bool(SqlValue::Text("0".into())),
            SqlValue::Bool(true)
        );
    }

    #[test]
    fn test_boolean_columns_match_exact_names() {
        let b = BooleanColumns::new(["IsHidden", "IsApproved"]);
        assert!(b.contains("IsApproved"));
        assert!(!b.contains("isapproved"));
        assert!(!b.contains("ViewCount"));
    }

    #[test]
    fn test_pg_text_rendering() {
        assert_eq!(SqlValue::Null.to_pg_text(), None);
        assert_eq!(SqlValue::Bool(true).to_pg_text().as_deref(), Some("t"));
        assert_eq!(SqlValue::Bool(false).to_pg_text().as_deref(), Some("f"));
        assert_eq!(SqlValue::Integer(-42).to_pg_text().as_deref(), Some("-42"));
        assert_eq!(SqlValue::Real(2.5).to_pg_text().as_deref(), Some("2.5"));
        assert_eq!(
            SqlValue::Blob(vec![0xde, 0xad]).to_pg_text().as_deref(),
            Some("\\xdead")
        );
        assert_eq!(
            SqlValue::Text("it's".into()).to_pg_text().as_deref(),
            Some("it's")
        );
    }

    #[test]
    fn test_pg_text_special_floats() {
        assert_eq!(SqlValue::Real(f64::NAN).to_pg_text().as_deref(), Some("NaN"));
        assert_eq!(
            SqlValue::Real(f64::NEG_INFINITY).to_pg_text().as_deref(),
            Some("-Infinity")
        );
    }

    #[test]
    fn test_from_option() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3i64)), SqlValue::Integer(3));
    }
}
