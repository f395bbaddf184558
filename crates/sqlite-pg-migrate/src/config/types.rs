//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "sqlite" for now).
    #[serde(default = "default_sqlite")]
    pub r#type: String,

    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "postgres" for now).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Falls back to `PGPASSWORD` when empty.
    #[serde(default)]
    pub password: String,

    /// Target schema (default: "public").
    #[serde(default = "default_public_schema")]
    pub schema: String,

    /// SSL mode: disable, require, verify-ca, verify-full (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Tables to copy, referenced tables before referencing tables.
    pub tables: Vec<String>,

    /// Columns whose 0/1 values are written as booleans.
    #[serde(default)]
    pub boolean_columns: Vec<String>,

    /// Primary key column backed by a sequence (default: "Id").
    #[serde(default = "default_identity_column")]
    pub identity_column: String,

    /// Tables without a single identity key (join tables); no sequence reset.
    #[serde(default)]
    pub sequence_exclude: Vec<String>,

    /// How foreign keys are suspended during the load.
    #[serde(default)]
    pub integrity_mode: IntegrityMode,

    /// Rows per INSERT statement (default: 1, one statement per row).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl MigrationConfig {
    /// Whether a table takes part in the sequence reset step.
    pub fn resets_sequence(&self, table: &str) -> bool {
        !self.sequence_exclude.iter().any(|t| t == table)
    }
}

/// How referential integrity is suspended for the bulk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityMode {
    /// `SET LOCAL session_replication_role = 'replica'`: FK triggers do not fire.
    #[default]
    ReplicationRole,

    /// `SET CONSTRAINTS ALL DEFERRED`: only affects DEFERRABLE constraints,
    /// which are checked again when enforcement is restored.
    Deferred,
}

// Default value functions for serde
fn default_sqlite() -> String {
    "sqlite".to_string()
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_public_schema() -> String {
    "public".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_identity_column() -> String {
    "Id".to_string()
}

fn default_batch_size() -> usize {
    1
}
