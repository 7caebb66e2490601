//! PostgreSQL sink
//!
//! One pool per run. `ensure_schema` issues `CREATE TABLE IF NOT EXISTS`
//! with a synthetic `id BIGSERIAL` primary key; `bulk_insert` writes a batch
//! inside one transaction using multi-row `INSERT ... VALUES` statements.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info};

use super::{SinkError, TableSink};
use crate::config::DatabaseConfig;
use crate::schema::{ColumnType, ConvertedRow, RowSchema, Value};

/// Maximum bind parameters PostgreSQL accepts in one statement
const PG_BIND_LIMIT: usize = 65_535;

pub struct PgTableSink {
    pool: PgPool,
}

impl PgTableSink {
    /// Open the pool and verify one connection can be established
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| SinkError::Connection(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database connection pool created"
        );

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TableSink for PgTableSink {
    async fn ensure_schema(&mut self, table: &str, schema: &RowSchema) -> Result<(), SinkError> {
        let sql = create_table_sql(table, schema);
        debug!(%sql, "Ensuring target table");

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| match classify(e) {
                SinkError::Insert(message) => SinkError::Schema(message),
                other => other,
            })?;

        info!(table, columns = schema.len(), "Target table ready");
        Ok(())
    }

    async fn bulk_insert(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[ConvertedRow],
    ) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }

        let prefix = insert_prefix(table, columns);
        let rows_per_statement = (PG_BIND_LIMIT / columns.len().max(1)).max(1);

        let mut tx = self.pool.begin().await.map_err(classify)?;

        for chunk in batch.chunks(rows_per_statement) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(&prefix);
            query_builder.push_values(chunk, |mut b, row| {
                for value in row.values() {
                    match value {
                        Value::DateTime(at) => b.push_bind(*at),
                        Value::Integer(n) => b.push_bind(*n),
                        Value::Text(text) => b.push_bind(text.as_str()),
                    };
                }
            });

            query_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }

        tx.commit().await.map_err(classify)?;
        Ok(())
    }

    async fn close(&mut self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}

/// Split sqlx errors into connection-level and statement-level failures
fn classify(err: sqlx::Error) -> SinkError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Configuration(_) => SinkError::Connection(err.to_string()),
        sqlx::Error::Database(ref db)
            if db.code().is_some_and(|code| is_connection_sqlstate(&code)) =>
        {
            SinkError::Connection(err.to_string())
        },
        other => SinkError::Insert(other.to_string()),
    }
}

/// SQLSTATE class 08 (connection exception) and the 57P0x shutdown codes
fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "57P01" | "57P02" | "57P03")
}

/// Double-quote an identifier, each dotted part separately
fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

fn sql_type(column_type: ColumnType, max_length: Option<u32>) -> String {
    match (column_type, max_length) {
        (ColumnType::DateTime, _) => "TIMESTAMP".to_string(),
        (ColumnType::Integer, _) => "BIGINT".to_string(),
        (ColumnType::String, Some(n)) => format!("VARCHAR({})", n),
        (ColumnType::String, None) => "TEXT".to_string(),
    }
}

/// DDL for the target table
pub fn create_table_sql(table: &str, schema: &RowSchema) -> String {
    let columns = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(&c.name), sql_type(c.column_type, c.max_length)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE TABLE IF NOT EXISTS {} (id BIGSERIAL PRIMARY KEY, {})",
        quote_ident(table),
        columns
    )
}

fn insert_prefix(table: &str, columns: &[&str]) -> String {
    let names = columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({}) ", quote_ident(table), names)
}
