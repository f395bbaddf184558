//! Core traits for the two ends of a migration.
//!
//! - [`SourceReader`]: reads whole tables from the source store
//! - [`TargetWriter`]: introspects and mutates the destination inside one
//!   transaction
//!
//! The orchestrator only talks to these traits, which lets tests drive the
//! full run against in-memory implementations.

use async_trait::async_trait;

use crate::config::IntegrityMode;
use crate::error::Result;

use super::plan::TablePlan;
use super::schema::{SourceTable, TargetColumn};
use super::value::Row;

/// Read data from the source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Column names of a table from its row description, in positional order.
    async fn get_columns(&self, table: &str) -> Result<Vec<String>>;

    /// Read every row of a table (`SELECT * FROM "<table>"`).
    async fn read_table(&self, table: &str) -> Result<SourceTable>;

    /// Get the row count for a table.
    async fn get_row_count(&self, table: &str) -> Result<i64>;

    /// Run a trivial query to prove the connection works.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier.
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(&self);
}

/// Write data to the destination database.
///
/// Every mutating call between [`begin`](TargetWriter::begin) and
/// [`commit`](TargetWriter::commit) belongs to a single transaction.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Destination columns of a table in ordinal order; empty if the table
    /// does not exist.
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<TargetColumn>>;

    /// Check if a table exists.
    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool>;

    /// Get the row count for a table.
    async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64>;

    /// Open the migration transaction.
    async fn begin(&self) -> Result<()>;

    /// Commit the migration transaction.
    async fn commit(&self) -> Result<()>;

    /// Abort the migration transaction.
    async fn rollback(&self) -> Result<()>;

    /// Suspend foreign-key enforcement for the rest of the transaction.
    async fn disable_referential_integrity(&self, mode: IntegrityMode) -> Result<()>;

    /// Restore foreign-key enforcement.
    async fn restore_referential_integrity(&self, mode: IntegrityMode) -> Result<()>;

    /// Remove all rows from a table, cascading to referencing tables.
    async fn truncate_table(&self, schema: &str, table: &str) -> Result<()>;

    /// Insert projected rows following `plan`.
    ///
    /// With `batch_size == 1` a single prepared statement is executed once
    /// per row; larger values group rows into multi-row INSERTs.
    async fn insert_rows(
        &self,
        schema: &str,
        plan: &TablePlan,
        rows: Vec<Row>,
        batch_size: usize,
    ) -> Result<u64>;

    /// Point the sequence behind `column` at `max(column) + 1` (or 1 when the
    /// table is empty) and return the next value it will hand out.
    ///
    /// A failure must leave the surrounding transaction usable.
    async fn reset_sequence(&self, schema: &str, table: &str, column: &str) -> Result<i64>;

    /// Run a trivial query to prove the connection works.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier.
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(&self);
}
