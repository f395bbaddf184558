//! # sqlite-pg-migrate
//!
//! One-shot bulk copy from a SQLite database into an existing PostgreSQL
//! schema.
//!
//! For each configured table the destination is truncated and reloaded from
//! the source, copying only the columns both sides share. The whole load runs
//! in a single PostgreSQL transaction with foreign-key enforcement suspended:
//!
//! - **Column intersection** driven by the destination's column order
//! - **Boolean conversion** of 0/1 source columns
//! - **Sequence reset** to `max(Id) + 1` after the load
//! - **Row-count verification** once the transaction commits
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Migrator};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let migrator = Migrator::connect(config).await?;
//!     let result = migrator.run(false).await?;
//!     println!("Migrated {} rows", result.rows_transferred);
//!     migrator.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod verify;

// Re-exports for convenient access
pub use config::{Config, IntegrityMode, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{BooleanColumns, SourceReader, SqlValue, TablePlan, TargetColumn, TargetWriter};
pub use error::{MigrateError, Result};
pub use orchestrator::{
    health_check, HealthCheckResult, MigrationResult, Migrator, SequenceReport, TableOutcome,
    TableReport,
};
pub use source::SqliteReader;
pub use target::PgTarget;
pub use verify::{CountStatus, TableCount, VerifyReport};
