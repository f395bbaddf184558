//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::error::{MigrateError, Result};
use crate::target::tls::SslMode;

/// Largest multi-row INSERT the writer will build.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }
    if config.source.r#type != "sqlite" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'sqlite', got '{}'",
            config.source.r#type
        )));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }
    validate_identifier(&config.target.schema)
        .map_err(|e| MigrateError::Config(format!("target.schema: {}", e)))?;
    SslMode::parse(&config.target.ssl_mode)?;

    // Migration validation
    let migration = &config.migration;
    if migration.tables.is_empty() {
        return Err(MigrateError::Config(
            "migration.tables must list at least one table".into(),
        ));
    }
    let mut seen = HashSet::new();
    for table in &migration.tables {
        validate_identifier(table)
            .map_err(|e| MigrateError::Config(format!("migration.tables: {}", e)))?;
        if !seen.insert(table.as_str()) {
            return Err(MigrateError::Config(format!(
                "migration.tables lists '{}' more than once",
                table
            )));
        }
    }
    for table in &migration.sequence_exclude {
        if !seen.contains(table.as_str()) {
            return Err(MigrateError::Config(format!(
                "migration.sequence_exclude names '{}', which is not in migration.tables",
                table
            )));
        }
    }
    validate_identifier(&migration.identity_column)
        .map_err(|e| MigrateError::Config(format!("migration.identity_column: {}", e)))?;
    if migration.batch_size == 0 || migration.batch_size > MAX_BATCH_SIZE {
        return Err(MigrateError::Config(format!(
            "migration.batch_size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, migration.batch_size
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegrityMode, MigrationConfig, SourceConfig, TargetConfig};

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                r#type: "sqlite".to_string(),
                path: "data/blog.db".into(),
            },
            target: TargetConfig {
                r#type: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5433,
                database: "my_blog".to_string(),
                user: "blog_admin".to_string(),
                password: "password".to_string(),
                schema: "public".to_string(),
                ssl_mode: "disable".to_string(),
            },
            migration: MigrationConfig {
                tables: vec!["Categories".into(), "Posts".into(), "PostTag".into()],
                boolean_columns: vec!["IsHidden".into()],
                identity_column: "Id".into(),
                sequence_exclude: vec!["PostTag".into()],
                integrity_mode: IntegrityMode::ReplicationRole,
                batch_size: 1,
            },
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_source_path() {
        let mut config = valid_config();
        config.source.path = "".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_source_type() {
        let mut config = valid_config();
        config.source.r#type = "mssql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_target_type() {
        let mut config = valid_config();
        config.target.r#type = "mysql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_ssl_mode() {
        let mut config = valid_config();
        config.target.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_table_list() {
        let mut config = valid_config();
        config.migration.tables.clear();
        config.migration.sequence_exclude.clear();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_duplicate_table() {
        let mut config = valid_config();
        config.migration.tables.push("Posts".into());
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_sequence_exclude_must_be_listed() {
        let mut config = valid_config();
        config.migration.sequence_exclude.push("Ghost".into());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
        config.migration.batch_size = MAX_BATCH_SIZE + 1;
        assert!(validate(&config).is_err());
        config.migration.batch_size = 500;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_target_config_debug_redacts_password() {
        let mut config = valid_config();
        config.target.password = "super_secret_password_456".to_string();
        let debug_output = format!("{:?}", config.target);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_456"),
            "Debug output should not contain actual password value"
        );
    }
}
