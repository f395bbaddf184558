//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source (SQLite) query or decode error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target (PostgreSQL) query error
    #[error("Target database error: {}", describe_pg_error(.0))]
    Target(#[from] tokio_postgres::Error),

    /// Connection could not be established, with context
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Data transfer failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// A NOT NULL destination column without default would receive no value
    #[error(
        "Table {table}: destination column \"{column}\" is NOT NULL without a default \
         and has no matching source column"
    )]
    RequiredColumnMissing { table: String, column: String },

    /// Sequence reset failed for a table
    #[error("Sequence reset failed for table {table}: {message}")]
    Sequence { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Sequence error
    pub fn sequence(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Sequence {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Process exit code for this error class.
    ///
    /// - 2: configuration (bad or unreadable config file)
    /// - 3: connection to either database failed
    /// - 4: migration failed after connecting
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Io(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } => 3,
            MigrateError::Source(_)
            | MigrateError::Target(_)
            | MigrateError::Transfer { .. }
            | MigrateError::RequiredColumnMissing { .. }
            | MigrateError::Sequence { .. } => 4,
            MigrateError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Text of a PostgreSQL error including what the server reported.
///
/// `tokio_postgres::Error` displays server errors as just "db error"; the
/// message, detail and hint live in the attached `DbError`.
pub fn describe_pg_error(err: &tokio_postgres::Error) -> String {
    if let Some(db) = err.as_db_error() {
        return format_db_message(db.message(), db.code().code(), db.detail(), db.hint());
    }

    let mut text = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !text.contains(&cause_text) {
            text.push_str(": ");
            text.push_str(&cause_text);
        }
        source = cause.source();
    }
    text
}

fn format_db_message(
    message: &str,
    sqlstate: &str,
    detail: Option<&str>,
    hint: Option<&str>,
) -> String {
    let mut text = format!("{} (SQLSTATE {})", message, sqlstate);
    if let Some(detail) = detail {
        text.push_str(&format!("; detail: {}", detail));
    }
    if let Some(hint) = hint {
        text.push_str(&format!("; hint: {}", hint));
    }
    text
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_class() {
        assert_eq!(MigrateError::Config("bad".into()).exit_code(), 2);
        assert_eq!(MigrateError::connection("refused", "target").exit_code(), 3);
        assert_eq!(MigrateError::transfer("Posts", "boom").exit_code(), 4);
        assert_eq!(
            MigrateError::RequiredColumnMissing {
                table: "Posts".into(),
                column: "Slug".into()
            }
            .exit_code(),
            4
        );
    }

    #[test]
    fn test_required_column_message_names_table_and_column() {
        let err = MigrateError::RequiredColumnMissing {
            table: "Posts".into(),
            column: "Slug".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Posts"));
        assert!(msg.contains("\"Slug\""));
    }

    #[test]
    fn test_db_message_keeps_server_text() {
        let text = format_db_message(
            "column \"Id\" of relation \"PostTag\" does not exist",
            "42703",
            None,
            Some("Perhaps you meant to reference the column \"PostTag.PostsId\"."),
        );
        assert_eq!(
            text,
            "column \"Id\" of relation \"PostTag\" does not exist (SQLSTATE 42703); \
             hint: Perhaps you meant to reference the column \"PostTag.PostsId\"."
        );

        let text = format_db_message("duplicate key value", "23505", Some("Key (\"Id\")=(1)"), None);
        assert!(text.contains("duplicate key value"));
        assert!(text.ends_with("; detail: Key (\"Id\")=(1)"));
    }

    #[test]
    fn test_client_side_pg_error_includes_cause() {
        let err = "port=notanumber"
            .parse::<tokio_postgres::Config>()
            .unwrap_err();
        let text = describe_pg_error(&err);
        assert!(text.starts_with(&err.to_string()));
        assert!(text.contains("port"));
        assert!(MigrateError::Target(err).to_string().contains("port"));
    }

    #[test]
    fn test_format_detailed_includes_cause_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml missing");
        let err = MigrateError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error"));
        assert!(detailed.contains("config.yaml missing"));
    }
}
