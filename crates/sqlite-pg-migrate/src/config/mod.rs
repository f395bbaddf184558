//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub use validation::MAX_BATCH_SIZE;

use crate::error::Result;
use std::path::Path;

/// Environment variable consulted when `target.password` is empty.
pub const PASSWORD_ENV: &str = "PGPASSWORD";

/// Annotated starting configuration written by `init`.
pub const EXAMPLE_CONFIG: &str = r#"# sqlite-pg-migrate configuration
source:
  # SQLite database file to read from
  path: ./data/blog.db

target:
  host: localhost
  port: 5432
  database: my_blog
  user: blog_admin
  # Leave empty to read PGPASSWORD from the environment
  password: ""
  schema: public
  # disable | require | verify-ca | verify-full
  ssl_mode: disable

migration:
  # Copy order: referenced tables before referencing tables
  tables:
    - Categories
    - Tags
    - Series
    - Users
    - UserProfiles
    - Posts
    - Comments
    - ImageAssets
    - PostLikes
    - PostTag
  # Columns stored as 0/1 in SQLite and boolean in PostgreSQL
  boolean_columns:
    - IsHidden
    - IsApproved
  # Primary key column whose sequence is reset after the load
  identity_column: Id
  # Tables without an identity key (join tables)
  sequence_exclude:
    - PostTag
  # replication_role | deferred
  integrity_mode: replication_role
  # Rows per INSERT statement
  batch_size: 1
"#;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        let config = config.with_password_fallback(std::env::var(PASSWORD_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Use `fallback` as the target password when none is configured.
    pub fn with_password_fallback(mut self, fallback: Option<String>) -> Self {
        if self.target.password.is_empty() {
            if let Some(password) = fallback {
                self.target.password = password;
            }
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl TargetConfig {
    /// `host:port/database` for log lines (never includes credentials).
    pub fn display_address(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
source:
  path: /tmp/blog.db
target:
  host: localhost
  database: my_blog
  user: blog_admin
  password: pw
migration:
  tables: [Categories, Posts]
"#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.source.r#type, "sqlite");
        assert_eq!(config.target.r#type, "postgres");
        assert_eq!(config.target.port, 5432);
        assert_eq!(config.target.schema, "public");
        assert_eq!(config.target.ssl_mode, "disable");
        assert_eq!(config.migration.identity_column, "Id");
        assert_eq!(config.migration.batch_size, 1);
        assert_eq!(config.migration.integrity_mode, IntegrityMode::ReplicationRole);
        assert!(config.migration.boolean_columns.is_empty());
        assert!(config.migration.sequence_exclude.is_empty());
    }

    #[test]
    fn test_table_order_is_preserved() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.migration.tables, vec!["Categories", "Posts"]);
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = Config::from_yaml(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.migration.tables.len(), 10);
        assert_eq!(config.migration.tables.first().unwrap(), "Categories");
        assert!(!config.migration.resets_sequence("PostTag"));
        assert!(config.migration.resets_sequence("Posts"));
    }

    #[test]
    fn test_integrity_mode_parses() {
        let yaml = MINIMAL.replace(
            "tables: [Categories, Posts]",
            "tables: [Categories, Posts]\n  integrity_mode: deferred",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.migration.integrity_mode, IntegrityMode::Deferred);
    }

    #[test]
    fn test_unknown_integrity_mode_rejected() {
        let yaml = MINIMAL.replace(
            "tables: [Categories, Posts]",
            "tables: [Categories, Posts]\n  integrity_mode: off",
        );
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_missing_tables_rejected() {
        let yaml = MINIMAL.replace("  tables: [Categories, Posts]\n", "  batch_size: 1\n");
        assert!(Config::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_password_fallback_only_when_empty() {
        let config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        let config = config.with_password_fallback(Some("from-env".into()));
        assert_eq!(config.target.password, "pw");

        let mut config: Config = serde_yaml::from_str(MINIMAL).unwrap();
        config.target.password.clear();
        let config = config.with_password_fallback(Some("from-env".into()));
        assert_eq!(config.target.password, "from-env");
    }

    #[test]
    fn test_display_address_has_no_credentials() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let addr = config.target.display_address();
        assert_eq!(addr, "localhost:5432/my_blog");
        assert!(!addr.contains("pw"));
    }
}
