//! Relational sink seam
//!
//! The orchestrator only talks to a [`TableSink`]. [`PgTableSink`] is the
//! production implementation; [`MemorySink`] records calls in memory.

use async_trait::async_trait;
use thiserror::Error;

use crate::schema::{ConvertedRow, RowSchema};

pub mod memory;
pub mod postgres;

pub use memory::MemorySink;
pub use postgres::PgTableSink;

/// Sink failures, split by how far they propagate
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// One batch could not be inserted; the file is abandoned
    #[error("Insert failed: {0}")]
    Insert(String),

    /// The target table could not be created or checked
    #[error("Schema setup failed: {0}")]
    Schema(String),

    /// The sink itself is unreachable; the run is over
    #[error("Sink connection failed: {0}")]
    Connection(String),
}

impl SinkError {
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, SinkError::Connection(_) | SinkError::Schema(_))
    }
}

/// Destination table for converted rows
#[async_trait]
pub trait TableSink: Send {
    /// Create the table if it does not exist. Safe to call repeatedly.
    async fn ensure_schema(&mut self, table: &str, schema: &RowSchema) -> Result<(), SinkError>;

    /// Insert one batch atomically: either every row lands or none does
    async fn bulk_insert(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[ConvertedRow],
    ) -> Result<(), SinkError>;

    /// Release the connection. Called once, after the last file.
    async fn close(&mut self);
}
