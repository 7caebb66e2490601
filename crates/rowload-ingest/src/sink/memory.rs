//! In-memory sink
//!
//! Stores inserted batches per table and can be told to fail specific insert
//! calls, which makes it the sink of choice for pipeline tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

use super::{SinkError, TableSink};
use crate::schema::{ConvertedRow, RowSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedBatch {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<ConvertedRow>,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, RowSchema>,
    batches: Vec<InsertedBatch>,
    insert_calls: usize,
    failures: HashMap<usize, SinkError>,
    ensure_calls: usize,
    close_calls: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `call`-th `bulk_insert` (0-based, counted across the run) fail
    pub fn fail_insert(mut self, call: usize, error: SinkError) -> Self {
        self.failures.insert(call, error);
        self
    }

    pub fn tables(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn batches(&self) -> &[InsertedBatch] {
        &self.batches
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(|b| b.rows.len()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.batches.iter().map(|b| b.rows.len()).sum()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls
    }

    pub fn ensure_calls(&self) -> usize {
        self.ensure_calls
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls
    }
}

#[async_trait]
impl TableSink for MemorySink {
    async fn ensure_schema(&mut self, table: &str, schema: &RowSchema) -> Result<(), SinkError> {
        self.ensure_calls += 1;
        self.tables
            .entry(table.to_string())
            .or_insert_with(|| schema.clone());
        Ok(())
    }

    async fn bulk_insert(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[ConvertedRow],
    ) -> Result<(), SinkError> {
        let call = self.insert_calls;
        self.insert_calls += 1;

        if let Some(err) = self.failures.remove(&call) {
            return Err(err);
        }
        if !self.tables.contains_key(table) {
            return Err(SinkError::Insert(format!("table '{}' does not exist", table)));
        }

        self.batches.push(InsertedBatch {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: batch.to_vec(),
        });
        Ok(())
    }

    async fn close(&mut self) {
        self.close_calls += 1;
    }
}
