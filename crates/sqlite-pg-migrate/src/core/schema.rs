//! Table and column metadata as seen from each side of the migration.

use serde::{Deserialize, Serialize};

use super::identifier::quote_ident;
use super::value::Row;
use crate::error::Result;

/// A destination column, as described by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetColumn {
    /// Column name (case preserved).
    pub name: String,

    /// Schema of the column's underlying type (`pg_catalog` for built-ins).
    pub udt_schema: String,

    /// Underlying type name (`int4`, `timestamptz`, `bool`, enum name, ...).
    pub udt_name: String,

    /// Whether the column accepts NULL.
    pub is_nullable: bool,

    /// Whether the column has a DEFAULT expression.
    pub has_default: bool,

    /// Whether the column is an identity column.
    pub is_identity: bool,

    /// Identity column declared `GENERATED ALWAYS`.
    pub identity_always: bool,

    /// Stored generated column (`GENERATED ALWAYS AS (...)`), never writable.
    pub is_generated: bool,
}

impl TargetColumn {
    /// Plain nullable column of the given built-in type.
    pub fn new(name: impl Into<String>, udt_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            udt_schema: "pg_catalog".to_string(),
            udt_name: udt_name.into(),
            is_nullable: true,
            has_default: false,
            is_identity: false,
            identity_always: false,
            is_generated: false,
        }
    }

    /// Mark the column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    /// Mark the column as having a default expression.
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    /// Mark the column as a `GENERATED BY DEFAULT AS IDENTITY` key.
    pub fn identity(mut self) -> Self {
        self.is_nullable = false;
        self.is_identity = true;
        self
    }

    /// Type expression used to cast text parameters into this column.
    pub fn cast_type(&self) -> Result<String> {
        Ok(format!(
            "{}.{}",
            quote_ident(&self.udt_schema)?,
            quote_ident(&self.udt_name)?
        ))
    }

    /// A column the database cannot fill on its own when omitted from an INSERT.
    pub fn is_required(&self) -> bool {
        !self.is_nullable && !self.has_default && !self.is_identity && !self.is_generated
    }
}

/// All rows of a source table with the column names from its row description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl SourceTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
