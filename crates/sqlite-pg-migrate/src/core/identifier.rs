//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! dynamic statement in this crate interpolates identifiers through these
//! helpers. SQLite and PostgreSQL share the same double-quote syntax, which
//! also preserves the mixed-case names ORM-generated schemas use (`"PostTag"`).

use crate::error::{MigrateError, Result};

/// PostgreSQL truncates identifiers past 63 bytes (NAMEDATALEN - 1).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier.
///
/// Rejects empty names, names containing NUL bytes and names PostgreSQL
/// would silently truncate.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier with double quotes, doubling embedded quotes.
///
/// ```ignore
/// assert_eq!(quote_ident("Posts")?, "\"Posts\"");
/// assert_eq!(quote_ident("odd\"name")?, "\"odd\"\"name\"");
/// ```
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a PostgreSQL table name with its schema.
pub fn qualify_pg(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}
