//! Row-count verification.
//!
//! Counting is purely observational: it never changes either database and
//! a table missing from the destination is reported, not treated as an error.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{SourceReader, TargetWriter};
use crate::error::Result;

/// Outcome of comparing one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    /// Source and destination counts agree.
    Match,
    /// Source and destination counts differ.
    Mismatch,
    /// The table does not exist in the destination.
    MissingTarget,
    /// No source count to compare against.
    Unchecked,
}

/// Row counts for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,

    /// Rows in the source, when known.
    pub source_rows: Option<i64>,

    /// Rows in the destination; `None` when the table is missing.
    pub target_rows: Option<i64>,
}

impl TableCount {
    pub fn status(&self) -> CountStatus {
        match (self.source_rows, self.target_rows) {
            (_, None) => CountStatus::MissingTarget,
            (None, Some(_)) => CountStatus::Unchecked,
            (Some(s), Some(t)) if s == t => CountStatus::Match,
            (Some(_), Some(_)) => CountStatus::Mismatch,
        }
    }
}

/// Row counts for every configured table, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub tables: Vec<TableCount>,
}

impl VerifyReport {
    /// Tables whose counts differ between source and destination.
    pub fn mismatches(&self) -> Vec<&TableCount> {
        self.tables
            .iter()
            .filter(|t| t.status() == CountStatus::Mismatch)
            .collect()
    }

    pub fn is_consistent(&self) -> bool {
        self.mismatches().is_empty()
    }

    pub fn get(&self, table: &str) -> Option<&TableCount> {
        self.tables.iter().find(|t| t.table == table)
    }
}

/// Destination row count, or `None` if the table does not exist.
pub async fn target_count(
    target: &dyn TargetWriter,
    schema: &str,
    table: &str,
) -> Result<Option<i64>> {
    if !target.table_exists(schema, table).await? {
        return Ok(None);
    }
    Ok(Some(target.get_row_count(schema, table).await?))
}

/// Count destination rows for `tables`, pairing each with a known source count.
pub async fn count_target_rows<'a, I>(
    target: &dyn TargetWriter,
    schema: &str,
    tables: I,
) -> Result<VerifyReport>
where
    I: IntoIterator<Item = (&'a str, Option<i64>)>,
{
    let mut report = VerifyReport::default();

    for (table, source_rows) in tables {
        let target_rows = target_count(target, schema, table).await?;
        match target_rows {
            Some(n) => info!("  {}: {} rows", table, n),
            None => warn!("  {}: not present in destination", table),
        }
        report.tables.push(TableCount {
            table: table.to_string(),
            source_rows,
            target_rows,
        });
    }

    Ok(report)
}

/// Compare source and destination row counts for `tables`.
pub async fn compare_row_counts(
    source: &dyn SourceReader,
    target: &dyn TargetWriter,
    schema: &str,
    tables: &[String],
) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for table in tables {
        let source_rows = source.get_row_count(table).await?;
        let target_rows = target_count(target, schema, table).await?;

        let count = TableCount {
            table: table.clone(),
            source_rows: Some(source_rows),
            target_rows,
        };
        match count.status() {
            CountStatus::Match => info!("{}: {} rows (match)", table, source_rows),
            CountStatus::MissingTarget => {
                warn!("{}: source={} target=missing", table, source_rows)
            }
            _ => warn!(
                "{}: source={} target={} (MISMATCH)",
                table,
                source_rows,
                target_rows.unwrap_or_default()
            ),
        }
        report.tables.push(count);
    }

    Ok(report)
}
