//! Shared fixtures for rowload integration tests
//!
//! - input trees written into a `TempDir`
//! - the four-column schema used across scenarios
//! - a PostgreSQL container wrapper for sink tests

#![allow(dead_code)]

use anyhow::{Context, Result};
use rowload_ingest::reader::Dialect;
use rowload_ingest::{ColumnSpec, ColumnType, LoadSettings, RowSchema};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

pub const HEADER: &str = "column1;column2;column3;column4";

/// `column1`, `column2` datetime, `column3` integer, `column4` string
pub fn schema() -> RowSchema {
    RowSchema::new(vec![
        ColumnSpec::new("column1", ColumnType::DateTime),
        ColumnSpec::new("column2", ColumnType::DateTime),
        ColumnSpec::new("column3", ColumnType::Integer),
        ColumnSpec::new("column4", ColumnType::String).with_max_length(32),
    ])
    .expect("valid schema")
}

/// One valid data line for [`schema`]
pub fn row(n: usize) -> String {
    format!("01/02/2024 10:00:00;01/02/2024 11:30:00;{};name{}", n, n)
}

/// Header plus `rows` valid lines
pub fn valid_file(rows: usize) -> String {
    let mut text = format!("{}\n", HEADER);
    for n in 0..rows {
        text.push_str(&row(n));
        text.push('\n');
    }
    text
}

pub fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    fs::write(&path, content).expect("write fixture");
    path
}

pub fn settings(root: &TempDir, batch_size: usize) -> LoadSettings {
    LoadSettings {
        table: "loaded_rows".to_string(),
        schema: schema(),
        root_dir: root.path().to_path_buf(),
        extension: "txt".to_string(),
        batch_size,
        dialect: Dialect::default(),
        skip_log_path: None,
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
            connection_string,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}
