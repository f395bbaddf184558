//! SQLite source reader.
//!
//! Tables are read whole with `SELECT *`. Column names come from the
//! prepared statement's row description, so they are known even for empty
//! tables, and each cell is decoded by its runtime storage class rather than
//! the declared column type (SQLite lets the two disagree).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row as _, Statement, TypeInfo, ValueRef};
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::identifier::quote_ident;
use crate::core::{Row, SourceReader, SourceTable, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite source reader implementation.
pub struct SqliteReader {
    pool: SqlitePool,
    path: PathBuf,
}

impl SqliteReader {
    /// Open the SQLite file read-only.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let context = format!("opening SQLite source {}", config.path.display());

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection(e, context.clone()))?;

        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::connection(e, context))?;

        info!("Opened SQLite source: {}", config.path.display());

        Ok(Self {
            pool,
            path: config.path.clone(),
        })
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn get_columns(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT * FROM {}", quote_ident(table)?);
        let statement = self.pool.prepare(sql.as_str()).await?;
        Ok(statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect())
    }

    async fn read_table(&self, table: &str) -> Result<SourceTable> {
        let sql = format!("SELECT * FROM {}", quote_ident(table)?);
        let statement = self.pool.prepare(sql.as_str()).await?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let sqlite_rows: Vec<SqliteRow> = statement.query().fetch_all(&self.pool).await?;
        let rows = sqlite_rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()?;

        debug!("Read {} rows from {} ({} columns)", rows.len(), table, columns.len());

        Ok(SourceTable {
            name: table.to_string(),
            columns,
            rows,
        })
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table)?);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Closed SQLite source {}", self.path.display());
    }
}

/// Decode a row by the runtime storage class of each cell.
fn decode_row(row: &SqliteRow) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());

    for idx in 0..row.len() {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }

        let storage = raw.type_info().name().to_string();
        let value = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get_unchecked::<i64, _>(idx)?),
            "REAL" => SqlValue::Real(row.try_get_unchecked::<f64, _>(idx)?),
            "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
            _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
        };
        values.push(value);
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seed(dir: &TempDir) -> SourceConfig {
        let path = dir.path().join("blog.db");
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();

        sqlx::query(
            "CREATE TABLE Comments (
                Id INTEGER PRIMARY KEY,
                Content TEXT NOT NULL,
                IsApproved INTEGER,
                Score REAL,
                Attachment BLOB
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO Comments (Id, Content, IsApproved, Score, Attachment) VALUES
                (1, 'first', 0, 1.5, X'CAFE'),
                (2, 'second', 1, NULL, NULL),
                (3, 'third', NULL, 0.0, NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE \"PostTag\" (PostsId INTEGER, TagsId INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        SourceConfig {
            r#type: "sqlite".into(),
            path,
        }
    }

    #[tokio::test]
    async fn test_read_table_columns_and_storage_classes() {
        let dir = TempDir::new().unwrap();
        let reader = SqliteReader::connect(&seed(&dir).await).await.unwrap();

        let table = reader.read_table("Comments").await.unwrap();
        assert_eq!(
            table.columns,
            vec!["Id", "Content", "IsApproved", "Score", "Attachment"]
        );
        assert_eq!(table.row_count(), 3);
        assert_eq!(
            table.rows[0],
            vec![
                SqlValue::Integer(1),
                SqlValue::Text("first".into()),
                SqlValue::Integer(0),
                SqlValue::Real(1.5),
                SqlValue::Blob(vec![0xca, 0xfe]),
            ]
        );
        assert_eq!(table.rows[1][2], SqlValue::Integer(1));
        assert_eq!(table.rows[1][3], SqlValue::Null);
        assert_eq!(table.rows[2][2], SqlValue::Null);

        reader.close().await;
    }

    #[tokio::test]
    async fn test_empty_table_still_has_columns() {
        let dir = TempDir::new().unwrap();
        let reader = SqliteReader::connect(&seed(&dir).await).await.unwrap();

        let table = reader.read_table("PostTag").await.unwrap();
        assert_eq!(table.columns, vec!["PostsId", "TagsId"]);
        assert!(table.rows.is_empty());
        assert_eq!(
            reader.get_columns("PostTag").await.unwrap(),
            vec!["PostsId", "TagsId"]
        );
    }

    #[tokio::test]
    async fn test_row_count() {
        let dir = TempDir::new().unwrap();
        let reader = SqliteReader::connect(&seed(&dir).await).await.unwrap();
        assert_eq!(reader.get_row_count("Comments").await.unwrap(), 3);
        assert_eq!(reader.get_row_count("PostTag").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let dir = TempDir::new().unwrap();
        let reader = SqliteReader::connect(&seed(&dir).await).await.unwrap();
        assert!(matches!(
            reader.read_table("Series").await,
            Err(MigrateError::Source(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_file_is_a_connection_error() {
        let dir = TempDir::new().unwrap();
        let config = SourceConfig {
            r#type: "sqlite".into(),
            path: dir.path().join("nope.db"),
        };
        match SqliteReader::connect(&config).await {
            Err(e @ MigrateError::Connection { .. }) => assert_eq!(e.exit_code(), 3),
            Err(other) => panic!("expected connection error, got {:?}", other),
            Ok(_) => panic!("expected connection error"),
        }
    }
}
