//! Migration orchestrator - main workflow coordinator.
//!
//! A run is strictly linear:
//!
//! `begin → disable FKs → (columns → fetch → truncate → insert) per table →
//! restore FKs → reset sequences → commit → verify`
//!
//! Everything before the commit happens in one destination transaction. Any
//! fatal error rolls it back explicitly, so the destination is either fully
//! reloaded or untouched.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::{BooleanColumns, SourceReader, TablePlan, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::source::SqliteReader;
use crate::target::PgTarget;
use crate::verify::{self, VerifyReport};


/// What happened to one configured table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOutcome {
    /// Destination truncated and reloaded.
    Migrated,
    /// Destination table does not exist; nothing was touched.
    SkippedMissing,
    /// Source table has no rows; destination left as it was.
    SkippedEmpty,
    /// Dry run: would be truncated and reloaded.
    Planned,
}

/// Per-table report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub outcome: TableOutcome,

    /// Rows inserted (source rows for a dry run).
    pub rows: u64,

    /// Source-only columns that were not copied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dropped_columns: Vec<String>,

    /// Destination-only columns left to their default or NULL.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defaulted_columns: Vec<String>,

    /// Required destination columns with no source value (dry run only;
    /// a real run fails on these).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_required: Vec<String>,
}

impl TableReport {
    fn skipped(table: &str, outcome: TableOutcome) -> Self {
        Self {
            table: table.to_string(),
            outcome,
            rows: 0,
            dropped_columns: Vec::new(),
            defaulted_columns: Vec::new(),
            missing_required: Vec::new(),
        }
    }

    fn from_plan(plan: TablePlan, outcome: TableOutcome, rows: u64) -> Self {
        Self {
            table: plan.table,
            outcome,
            rows,
            dropped_columns: plan.source_only,
            defaulted_columns: plan.destination_only,
            missing_required: plan.missing_required,
        }
    }

    /// Source row count the destination must match after the run, if any.
    fn expected_rows(&self) -> Option<i64> {
        match self.outcome {
            TableOutcome::Migrated => Some(self.rows as i64),
            _ => None,
        }
    }
}

/// Sequence reset outcome for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    pub table: String,

    /// Next value the sequence will hand out.
    pub next_value: Option<i64>,

    /// Why the reset was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: "completed" or "dry_run".
    pub status: String,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-table reports in configured order.
    pub tables: Vec<TableReport>,

    /// Tables truncated and reloaded.
    pub tables_migrated: usize,

    /// Tables skipped (missing in destination or empty in source).
    pub tables_skipped: usize,

    /// Total rows transferred.
    pub rows_transferred: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: i64,

    /// Sequence reset outcomes.
    pub sequences: Vec<SequenceReport>,

    /// Post-commit row counts (absent for dry runs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerifyReport>,
}

impl MigrationResult {
    fn new(run_id: String, started_at: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            run_id,
            status: if dry_run { "dry_run" } else { "completed" }.to_string(),
            started_at,
            completed_at: started_at,
            duration_seconds: 0.0,
            tables: Vec::new(),
            tables_migrated: 0,
            tables_skipped: 0,
            rows_transferred: 0,
            rows_per_second: 0,
            sequences: Vec::new(),
            verification: None,
        }
    }

    fn finish(&mut self) {
        self.completed_at = Utc::now();
        self.duration_seconds =
            (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;

        self.tables_migrated = self
            .tables
            .iter()
            .filter(|t| t.outcome == TableOutcome::Migrated)
            .count();
        self.tables_skipped = self
            .tables
            .iter()
            .filter(|t| {
                matches!(
                    t.outcome,
                    TableOutcome::SkippedMissing | TableOutcome::SkippedEmpty
                )
            })
            .count();
        self.rows_transferred = self
            .tables
            .iter()
            .filter(|t| t.outcome == TableOutcome::Migrated)
            .map(|t| t.rows)
            .sum();
        self.rows_per_second = if self.duration_seconds > 0.0 {
            (self.rows_transferred as f64 / self.duration_seconds) as i64
        } else {
            0
        };
    }

    /// Look up the report for a table.
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table == name)
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Connectivity report for both databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,
    pub healthy: bool,
}

/// Migration orchestrator.
pub struct Migrator {
    config: Config,
    booleans: BooleanColumns,
    source: Box<dyn SourceReader>,
    target: Box<dyn TargetWriter>,
}

impl Migrator {
    /// Open the SQLite source and the PostgreSQL target.
    pub async fn connect(config: Config) -> Result<Self> {
        let source = SqliteReader::connect(&config.source).await?;
        let target = PgTarget::connect(&config.target).await?;
        Ok(Self::with_endpoints(config, Box::new(source), Box::new(target)))
    }

    /// Build a migrator over already-open endpoints.
    pub fn with_endpoints(
        config: Config,
        source: Box<dyn SourceReader>,
        target: Box<dyn TargetWriter>,
    ) -> Self {
        let booleans = BooleanColumns::new(config.migration.boolean_columns.iter().cloned());
        Self {
            config,
            booleans,
            source,
            target,
        }
    }

    /// Run the migration, or only plan it when `dry_run` is set.
    pub async fn run(&self, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut result = MigrationResult::new(run_id, started_at, dry_run);

        info!(
            "Starting migration run {} ({} tables, {} -> {})",
            result.run_id,
            self.config.migration.tables.len(),
            self.source.db_type(),
            self.target.db_type()
        );

        if dry_run {
            info!("Dry run: nothing will be written");
            for table in &self.config.migration.tables {
                let report = self.plan_table(table).await?;
                result.tables.push(report);
            }
            result.finish();
            return Ok(result);
        }

        self.target.begin().await?;
        if let Err(e) = self.load(&mut result).await {
            error!("Migration failed, rolling back: {}", e);
            if let Err(rollback_err) = self.target.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            return Err(e);
        }
        self.target.commit().await?;
        info!("Migration committed");

        // The data is committed at this point; counting can only report.
        info!("Data verification:");
        match verify::count_target_rows(
            self.target.as_ref(),
            &self.config.target.schema,
            result
                .tables
                .iter()
                .map(|t| (t.table.as_str(), t.expected_rows())),
        )
        .await
        {
            Ok(verification) => {
                for mismatch in verification.mismatches() {
                    warn!(
                        "{}: copied {} rows but destination holds {}",
                        mismatch.table,
                        mismatch.source_rows.unwrap_or_default(),
                        mismatch.target_rows.unwrap_or_default()
                    );
                }
                result.verification = Some(verification);
            }
            Err(e) => warn!("Row-count verification failed after commit: {}", e),
        }

        result.finish();
        info!(
            "Migration {}: {} tables migrated, {} skipped, {} rows in {:.1}s ({} rows/s)",
            result.status,
            result.tables_migrated,
            result.tables_skipped,
            result.rows_transferred,
            result.duration_seconds,
            result.rows_per_second
        );

        Ok(result)
    }

    /// Everything inside the transaction.
    async fn load(&self, result: &mut MigrationResult) -> Result<()> {
        let mode = self.config.migration.integrity_mode;

        self.target.disable_referential_integrity(mode).await?;

        for table in &self.config.migration.tables {
            let report = self.migrate_table(table).await?;
            result.tables.push(report);
        }

        self.target.restore_referential_integrity(mode).await?;

        info!("Resetting sequences");
        let tables: Vec<String> = result
            .tables
            .iter()
            .filter(|t| t.outcome != TableOutcome::SkippedMissing)
            .filter(|t| self.config.migration.resets_sequence(&t.table))
            .map(|t| t.table.clone())
            .collect();
        for table in tables {
            let report = self.reset_sequence(&table).await;
            result.sequences.push(report);
        }

        Ok(())
    }

    /// Copy one table: resolve columns, fetch, truncate, insert.
    async fn migrate_table(&self, table: &str) -> Result<TableReport> {
        let schema = &self.config.target.schema;
        info!("Migrating {}...", table);

        let target_columns = self.target.get_columns(schema, table).await?;
        if target_columns.is_empty() {
            warn!("  {}: table not found in destination, skipping", table);
            return Ok(TableReport::skipped(table, TableOutcome::SkippedMissing));
        }

        let source = self.source.read_table(table).await?;
        if source.rows.is_empty() {
            info!("  {}: no data in source", table);
            return Ok(TableReport::skipped(table, TableOutcome::SkippedEmpty));
        }

        let plan = TablePlan::build(table, &target_columns, &source.columns, &self.booleans)?;
        if !plan.source_only.is_empty() {
            warn!("  {}: skipping source-only columns: {:?}", table, plan.source_only);
        }
        if !plan.skipped_generated.is_empty() {
            debug!(
                "  {}: not writing generated columns: {:?}",
                table, plan.skipped_generated
            );
        }
        plan.ensure_required_columns()?;
        if plan.columns.is_empty() {
            return Err(MigrateError::transfer(
                table,
                "no columns in common between source and destination",
            ));
        }

        self.target.truncate_table(schema, table).await?;

        let rows = source.rows.into_iter().map(|row| plan.project(row)).collect();
        let inserted = self
            .target
            .insert_rows(schema, &plan, rows, self.config.migration.batch_size)
            .await?;

        info!("  {}: migrated {} rows", table, inserted);
        Ok(TableReport::from_plan(plan, TableOutcome::Migrated, inserted))
    }

    /// Plan one table without writing.
    async fn plan_table(&self, table: &str) -> Result<TableReport> {
        let schema = &self.config.target.schema;

        let target_columns = self.target.get_columns(schema, table).await?;
        if target_columns.is_empty() {
            warn!("{}: table not found in destination, would skip", table);
            return Ok(TableReport::skipped(table, TableOutcome::SkippedMissing));
        }

        let source_columns = self.source.get_columns(table).await?;
        let rows = self.source.get_row_count(table).await?;
        let plan = TablePlan::build(table, &target_columns, &source_columns, &self.booleans)?;

        let outcome = if rows == 0 {
            info!("{}: no data in source, would skip", table);
            TableOutcome::SkippedEmpty
        } else {
            info!(
                "{}: would copy {} rows into {} columns",
                table,
                rows,
                plan.columns.len()
            );
            TableOutcome::Planned
        };
        if !plan.source_only.is_empty() {
            warn!("{}: would skip source-only columns: {:?}", table, plan.source_only);
        }
        if !plan.missing_required.is_empty() {
            warn!(
                "{}: required destination columns have no source value: {:?}",
                table, plan.missing_required
            );
        }

        Ok(TableReport::from_plan(plan, outcome, rows.max(0) as u64))
    }

    /// Reset one sequence; failures are reported, never fatal.
    async fn reset_sequence(&self, table: &str) -> SequenceReport {
        let column = &self.config.migration.identity_column;
        match self
            .target
            .reset_sequence(&self.config.target.schema, table, column)
            .await
        {
            Ok(next) => {
                debug!("  {}: next {} = {}", table, column, next);
                SequenceReport {
                    table: table.to_string(),
                    next_value: Some(next),
                    warning: None,
                }
            }
            Err(e) => {
                warn!("  {} sequence - {}", table, e);
                SequenceReport {
                    table: table.to_string(),
                    next_value: None,
                    warning: Some(e.to_string()),
                }
            }
        }
    }

    /// Compare source and destination row counts for every configured table.
    pub async fn validate(&self) -> Result<VerifyReport> {
        verify::compare_row_counts(
            self.source.as_ref(),
            self.target.as_ref(),
            &self.config.target.schema,
            &self.config.migration.tables,
        )
        .await
    }

    /// Close both connections.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

/// Try to reach both databases independently.
pub async fn health_check(config: &Config) -> HealthCheckResult {
    let start = Instant::now();
    let source = match SqliteReader::connect(&config.source).await {
        Ok(reader) => {
            let r = reader.test_connection().await;
            reader.close().await;
            r
        }
        Err(e) => Err(e),
    };
    let source_latency_ms = start.elapsed().as_millis() as u64;

    let start = Instant::now();
    let target = match PgTarget::connect(&config.target).await {
        Ok(writer) => {
            let r = writer.test_connection().await;
            writer.close().await;
            r
        }
        Err(e) => Err(e),
    };
    let target_latency_ms = start.elapsed().as_millis() as u64;

    HealthCheckResult {
        source_connected: source.is_ok(),
        source_latency_ms,
        source_error: source.as_ref().err().map(|e| e.to_string()),
        target_connected: target.is_ok(),
        target_latency_ms,
        target_error: target.as_ref().err().map(|e| e.to_string()),
        healthy: source.is_ok() && target.is_ok(),
    }
}
