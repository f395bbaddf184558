//! PostgreSQL target database operations.
//!
//! The writer holds exactly one connection. The orchestrator wraps the whole
//! load in an explicit transaction on it, so every truncate, insert and
//! sequence reset becomes visible at once on commit or not at all.

pub mod tls;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_postgres::config::SslMode as PgSslMode;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config as PgConfig, Connection, NoTls};
use tracing::{debug, error, info};

use crate::config::{IntegrityMode, TargetConfig};
use crate::core::identifier::{qualify_pg, quote_ident};
use crate::core::{Row, SqlValue, TablePlan, TargetColumn, TargetWriter};
use crate::error::{describe_pg_error, MigrateError, Result};
use tls::TlsBuilder;

/// PostgreSQL caps a single statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

/// Looks up the sequence owned by a column (serial or identity).
const SERIAL_SEQUENCE_SQL: &str = "SELECT pg_get_serial_sequence($1, $2)";

const SAVEPOINT_SQL: &str = "SAVEPOINT sequence_reset";
const RELEASE_SAVEPOINT_SQL: &str = "RELEASE SAVEPOINT sequence_reset";
const ROLLBACK_TO_SAVEPOINT_SQL: &str =
    "ROLLBACK TO SAVEPOINT sequence_reset; RELEASE SAVEPOINT sequence_reset";

/// PostgreSQL target implementation.
pub struct PgTarget {
    client: Client,
    connection: JoinHandle<()>,
    address: String,
}

impl PgTarget {
    /// Connect to the target database.
    pub async fn connect(config: &TargetConfig) -> Result<Self> {
        let address = config.display_address();

        let mut pg_config = PgConfig::new();
        pg_config
            .host(&config.host)
            .port(config.port)
            .dbname(&config.database)
            .user(&config.user)
            .password(&config.password)
            .application_name("sqlite-pg-migrate");

        let context = format!("connecting to PostgreSQL target {}", address);
        let (client, connection) = match TlsBuilder::parse(&config.ssl_mode)?.build()? {
            Some(tls) => {
                pg_config.ssl_mode(PgSslMode::Require);
                let (client, conn) = pg_config
                    .connect(tls)
                    .await
                    .map_err(|e| {
                        MigrateError::connection(describe_pg_error(&e), context.clone())
                    })?;
                (client, spawn_connection(conn))
            }
            None => {
                pg_config.ssl_mode(PgSslMode::Disable);
                let (client, conn) = pg_config
                    .connect(NoTls)
                    .await
                    .map_err(|e| {
                        MigrateError::connection(describe_pg_error(&e), context.clone())
                    })?;
                (client, spawn_connection(conn))
            }
        };

        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(describe_pg_error(&e), context))?;

        info!("Connected to PostgreSQL: {}", address);

        Ok(Self {
            client,
            connection,
            address,
        })
    }

    async fn try_reset_sequence(
        &self,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<Option<i64>> {
        let qualified = qualify_pg(schema, table)?;
        let row = self
            .client
            .query_one(SERIAL_SEQUENCE_SQL, &[&qualified, &column])
            .await?;
        let sequence: Option<String> = row.get(0);
        let Some(sequence) = sequence else {
            return Ok(None);
        };

        let sql = build_setval_sql(schema, table, column)?;
        let row = self.client.query_one(&sql, &[&sequence]).await?;
        let next: i64 = row.get(0);

        debug!("Reset {} to {}", sequence, next);
        Ok(Some(next))
    }
}

/// Drive the connection on a background task until the client is dropped.
fn spawn_connection<S, T>(connection: Connection<S, T>) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("PostgreSQL connection error: {}", e);
        }
    })
}

#[async_trait]
impl TargetWriter for PgTarget {
    async fn get_columns(&self, schema: &str, table: &str) -> Result<Vec<TargetColumn>> {
        let rows = self
            .client
            .query(
                "SELECT column_name::text,
                        udt_schema::text,
                        udt_name::text,
                        is_nullable::text = 'YES',
                        column_default IS NOT NULL,
                        is_identity::text = 'YES',
                        COALESCE(identity_generation::text, '') = 'ALWAYS',
                        COALESCE(is_generated::text, 'NEVER') = 'ALWAYS'
                 FROM information_schema.columns
                 WHERE table_schema = $1 AND table_name = $2
                 ORDER BY ordinal_position",
                &[&schema, &table],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| TargetColumn {
                name: row.get(0),
                udt_schema: row.get(1),
                udt_name: row.get(2),
                is_nullable: row.get(3),
                has_default: row.get(4),
                is_identity: row.get(5),
                identity_always: row.get(6),
                is_generated: row.get(7),
            })
            .collect())
    }

    async fn table_exists(&self, schema: &str, table: &str) -> Result<bool> {
        let row = self
            .client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM information_schema.tables
                    WHERE table_schema = $1 AND table_name = $2
                )",
                &[&schema, &table],
            )
            .await?;

        Ok(row.get(0))
    }

    async fn get_row_count(&self, schema: &str, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", qualify_pg(schema, table)?);
        let row = self.client.query_one(&sql, &[]).await?;
        Ok(row.get(0))
    }

    async fn begin(&self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        debug!("Transaction started on {}", self.address);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        debug!("Transaction committed on {}", self.address);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        debug!("Transaction rolled back on {}", self.address);
        Ok(())
    }

    async fn disable_referential_integrity(&self, mode: IntegrityMode) -> Result<()> {
        let sql = match mode {
            IntegrityMode::ReplicationRole => "SET LOCAL session_replication_role = 'replica'",
            IntegrityMode::Deferred => "SET CONSTRAINTS ALL DEFERRED",
        };
        self.client.batch_execute(sql).await?;
        debug!("{}", sql);
        Ok(())
    }

    async fn restore_referential_integrity(&self, mode: IntegrityMode) -> Result<()> {
        let sql = match mode {
            IntegrityMode::ReplicationRole => "SET LOCAL session_replication_role = 'origin'",
            IntegrityMode::Deferred => "SET CONSTRAINTS ALL IMMEDIATE",
        };
        self.client.batch_execute(sql).await?;
        debug!("{}", sql);
        Ok(())
    }

    async fn truncate_table(&self, schema: &str, table: &str) -> Result<()> {
        let sql = format!("TRUNCATE {} CASCADE", qualify_pg(schema, table)?);
        self.client.batch_execute(&sql).await?;
        debug!("Truncated table {}.{}", schema, table);
        Ok(())
    }

    async fn insert_rows(
        &self,
        schema: &str,
        plan: &TablePlan,
        rows: Vec<Row>,
        batch_size: usize,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        if plan.columns.is_empty() {
            return Err(MigrateError::transfer(
                &plan.table,
                "no columns in common between source and destination",
            ));
        }

        let rows_per_statement = rows_per_statement(batch_size, plan.columns.len());
        let sql = build_insert_sql(schema, plan, rows_per_statement)?;
        let statement = self.client.prepare(&sql).await?;
        debug!("{}", sql);

        let mut total = 0u64;
        for chunk in rows.chunks(rows_per_statement) {
            let params = chunk_params(chunk);
            let refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            let result = if chunk.len() == rows_per_statement {
                self.client.execute(&statement, &refs).await
            } else {
                let tail = self
                    .client
                    .prepare(&build_insert_sql(schema, plan, chunk.len())?)
                    .await?;
                self.client.execute(&tail, &refs).await
            };

            match result {
                Ok(n) => total += n,
                Err(e) => {
                    if let Some(first_row) = chunk.first() {
                        let row_preview: Vec<String> =
                            first_row.iter().take(5).map(|v| format!("{:?}", v)).collect();
                        error!(
                            "Insert failed for {}.{}: {} - first row preview: {:?}",
                            schema,
                            plan.table,
                            describe_pg_error(&e),
                            row_preview
                        );
                    }
                    return Err(MigrateError::Target(e));
                }
            }
        }

        Ok(total)
    }

    async fn reset_sequence(&self, schema: &str, table: &str, column: &str) -> Result<i64> {
        self.client.batch_execute(SAVEPOINT_SQL).await?;

        match self.try_reset_sequence(schema, table, column).await {
            Ok(Some(next)) => {
                self.client.batch_execute(RELEASE_SAVEPOINT_SQL).await?;
                Ok(next)
            }
            Ok(None) => {
                self.client.batch_execute(RELEASE_SAVEPOINT_SQL).await?;
                Err(MigrateError::sequence(
                    table,
                    format!("column \"{}\" is not backed by a sequence", column),
                ))
            }
            Err(e) => {
                self.client.batch_execute(ROLLBACK_TO_SAVEPOINT_SQL).await?;
                Err(MigrateError::sequence(table, e))
            }
        }
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.connection.abort();
        debug!("Closed PostgreSQL connection to {}", self.address);
    }
}

/// Rows per INSERT statement, bounded by the bind-parameter limit.
fn rows_per_statement(batch_size: usize, column_count: usize) -> usize {
    let max_rows = (MAX_BIND_PARAMS / column_count.max(1)).max(1);
    batch_size.clamp(1, max_rows)
}

/// Text parameters for a chunk of rows, row-major.
fn chunk_params(chunk: &[Row]) -> Vec<Option<String>> {
    chunk
        .iter()
        .flat_map(|row| row.iter().map(SqlValue::to_pg_text))
        .collect()
}

/// `setval` pointing the sequence (bound as `$1`) past the column's maximum.
///
/// `is_called = false` makes the next `nextval` return exactly
/// `max + 1`, or 1 for an empty table.
fn build_setval_sql(schema: &str, table: &str, column: &str) -> Result<String> {
    Ok(format!(
        "SELECT setval($1::text::regclass, COALESCE(MAX({})::bigint, 0) + 1, false) FROM {}",
        quote_ident(column)?,
        qualify_pg(schema, table)?
    ))
}

/// Build a parameterized INSERT for `row_count` rows.
///
/// Every parameter is bound as text and cast to the destination column type,
/// leaving type conversion to PostgreSQL's input functions.
fn build_insert_sql(schema: &str, plan: &TablePlan, row_count: usize) -> Result<String> {
    let col_list = plan
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut idx = 1;
    let mut value_rows = Vec::with_capacity(row_count);
    for _ in 0..row_count {
        let placeholders: Vec<String> = plan
            .columns
            .iter()
            .map(|c| {
                let p = format!("${}::text::{}", idx, c.cast_type);
                idx += 1;
                p
            })
            .collect();
        value_rows.push(format!("({})", placeholders.join(", ")));
    }

    let overriding = if plan.overriding_system_value {
        " OVERRIDING SYSTEM VALUE"
    } else {
        ""
    };

    Ok(format!(
        "INSERT INTO {} ({}){} VALUES {}",
        qualify_pg(schema, &plan.table)?,
        col_list,
        overriding,
        value_rows.join(", ")
    ))
}
