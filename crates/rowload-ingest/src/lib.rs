//! Rowload Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads delimited text files into a relational table.
//!
//! # Overview
//!
//! - **Reading**: [`reader::DelimitedReader`] splits and decodes one file
//! - **Header resolution**: [`header::ColumnIndices`] maps declared columns
//!   to header positions, once per file
//! - **Conversion**: [`convert::RowConverter`] produces an accepted typed row
//!   or a rejection, never a partial row
//! - **Batching**: [`batch::BatchIterator`] groups accepted rows into bounded
//!   batches and writes rejections to a [`skip_log::SkipLog`]
//! - **Loading**: [`orchestrator::LoadOrchestrator`] walks the input tree and
//!   hands batches to a [`sink::TableSink`]
//!
//! # Example
//!
//! ```no_run
//! use rowload_ingest::{LoaderConfig, LoadOrchestrator, PgTableSink, FileSkipLog};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = LoaderConfig::load("rowload.yml")?.apply_env()?;
//! let settings = config.to_settings()?;
//! let sink = PgTableSink::connect(&config.database).await?;
//! let skip_log = FileSkipLog::open(&config.skip_log)?;
//!
//! let summary = LoadOrchestrator::new(settings, sink, skip_log).run().await?;
//! println!("{} rows inserted", summary.rows_inserted());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod convert;
pub mod discovery;
pub mod error;
pub mod header;
pub mod orchestrator;
pub mod reader;
pub mod schema;
pub mod sink;
pub mod skip_log;

// Re-export commonly used types
pub use config::{DatabaseConfig, LoaderConfig};
pub use error::{IngestError, IngestResult};
pub use orchestrator::{FileReport, FileState, LoadOrchestrator, LoadSettings, RunSummary};
pub use schema::{ColumnSpec, ColumnType, RowSchema};
pub use sink::{MemorySink, PgTableSink, SinkError, TableSink};
pub use skip_log::{FileSkipLog, MemorySkipLog, SkipLog};

use clap::Parser;
use rowload_common::logging::{LogConfig, LogLevel, LogOutput};
use std::path::PathBuf;

/// Rowload - bulk loader for delimited text files
#[derive(Parser, Debug)]
#[command(name = "rowload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file
    #[arg(short, long, env = "ROWLOAD_CONFIG", default_value = "rowload.yml")]
    pub config: PathBuf,

    /// Root directory to scan, overrides the configuration
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Rows per insert batch, overrides the configuration
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip log path, overrides the configuration
    #[arg(long)]
    pub skip_log: Option<PathBuf>,

    /// Validate configuration and list input files without loading
    #[arg(long)]
    pub validate_only: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Logging setup from the verbose flag, with `LOG_*` variables on top.
    /// An invalid variable is an error rather than a silent fallback.
    pub fn log_config(&self) -> anyhow::Result<LogConfig> {
        LogConfig::builder()
            .level(if self.verbose { LogLevel::Debug } else { LogLevel::Info })
            .output(LogOutput::Console)
            .log_file_prefix("rowload")
            .build()
            .merge_env()
    }

    /// Apply command-line overrides, which take precedence over the
    /// environment and the file
    pub fn apply_overrides(&self, mut config: LoaderConfig) -> LoaderConfig {
        if let Some(root) = &self.root {
            config.root_dir = root.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(skip_log) = &self.skip_log {
            config.skip_log = skip_log.clone();
        }
        config
    }
}
