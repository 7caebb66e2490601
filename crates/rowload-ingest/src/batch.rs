//! Per-file batching
//!
//! [`BatchIterator`] pulls records from a [`DelimitedReader`], converts them,
//! writes rejections to the skip log, and hands out accepted rows in batches
//! of at most `batch_size`. It is a single pass over one file: once it
//! returns `None` or an error it yields nothing more.

use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, error, warn};

use crate::convert::{Rejection, RowConverter, RowOutcome};
use crate::error::IngestError;
use crate::reader::{DelimitedReader, RawRecord};
use crate::schema::Batch;
use crate::skip_log::{SkipLog, SkipReason, SkipRecord};

/// Counters for one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStats {
    /// Lines consumed, header included
    pub lines_read: u64,
    pub rows_accepted: u64,
    pub rows_skipped: u64,
    pub skipped_by_reason: HashMap<SkipReason, u64>,
    pub batches_emitted: u64,
    /// Skip records that could not be written
    pub skip_log_failures: u64,
}

pub struct BatchIterator<'a, R: Read, L: SkipLog> {
    reader: DelimitedReader<R>,
    converter: RowConverter<'a>,
    skip_log: L,
    file: String,
    batch_size: usize,
    ready: Option<Batch>,
    exhausted: bool,
    stats: FileStats,
}

impl<'a, R: Read, L: SkipLog> BatchIterator<'a, R, L> {
    /// `reader` must be positioned after the header; the header line is
    /// counted as already read.
    pub fn new(
        reader: DelimitedReader<R>,
        converter: RowConverter<'a>,
        skip_log: L,
        file: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            reader,
            converter,
            skip_log,
            file: file.into(),
            batch_size: batch_size.max(1),
            ready: None,
            exhausted: false,
            stats: FileStats {
                lines_read: 1,
                ..FileStats::default()
            },
        }
    }

    pub fn stats(&self) -> &FileStats {
        &self.stats
    }

    /// Whether another batch is available. Reads ahead to find out.
    pub fn has_next_batch(&mut self) -> Result<bool, IngestError> {
        if self.ready.is_none() && !self.exhausted {
            self.ready = self.fill()?;
        }
        Ok(self.ready.is_some())
    }

    /// Take the next batch, or `None` once the file is exhausted
    pub fn take_next_batch(&mut self) -> Result<Option<Batch>, IngestError> {
        self.has_next_batch()?;
        Ok(self.ready.take())
    }

    fn fill(&mut self) -> Result<Option<Batch>, IngestError> {
        let mut batch = Vec::with_capacity(self.batch_size);

        while batch.len() < self.batch_size {
            let record = match self.reader.next_record() {
                Ok(Some(record)) => record,
                Ok(None) => {
                    self.exhausted = true;
                    break;
                },
                Err(err) => {
                    self.exhausted = true;
                    return Err(err);
                },
            };
            self.stats.lines_read += 1;

            if record.lossy {
                let detail = format!("invalid {} bytes", self.reader.dialect().encoding.name());
                self.skip(
                    &record,
                    Rejection {
                        reason: SkipReason::EncodingError,
                        detail,
                    },
                );
                continue;
            }

            match self.converter.convert(&record.fields) {
                RowOutcome::Accepted(row) => {
                    self.stats.rows_accepted += 1;
                    batch.push(row);
                },
                RowOutcome::Rejected(rejection) => self.skip(&record, rejection),
            }
        }

        if batch.is_empty() {
            return Ok(None);
        }

        self.stats.batches_emitted += 1;
        debug!(
            file = %self.file,
            batch = self.stats.batches_emitted,
            rows = batch.len(),
            "Batch ready"
        );
        Ok(Some(batch))
    }

    fn skip(&mut self, record: &RawRecord, rejection: Rejection) {
        self.stats.rows_skipped += 1;
        *self.stats.skipped_by_reason.entry(rejection.reason).or_insert(0) += 1;

        warn!(
            file = %self.file,
            line = record.line,
            reason = %rejection.reason,
            detail = %rejection.detail,
            "Skipping row"
        );

        let entry = SkipRecord {
            file: self.file.clone(),
            line: record.line,
            raw_data: record.joined(self.reader.dialect().delimiter),
            reason: rejection.reason,
        };

        // best effort: a lost skip record never stops the file
        if let Err(err) = self.skip_log.record(&entry) {
            self.stats.skip_log_failures += 1;
            error!(
                file = %self.file,
                line = record.line,
                error = %err,
                "Failed to write skip record"
            );
        }
    }
}

impl<R: Read, L: SkipLog> Iterator for BatchIterator<'_, R, L> {
    type Item = Result<Batch, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.take_next_batch().transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::header::ColumnIndices;
    use crate::reader::Dialect;
    use crate::schema::{ColumnSpec, ColumnType, RowSchema, Value};
    use crate::skip_log::MemorySkipLog;
    use std::io;

    fn schema() -> RowSchema {
        RowSchema::new(vec![
            ColumnSpec::new("id", ColumnType::Integer),
            ColumnSpec::new("name", ColumnType::String),
        ])
        .unwrap()
    }

    fn input(rows: usize) -> String {
        let mut text = String::from("id;name\n");
        for i in 0..rows {
            text.push_str(&format!("{};row{}\n", i, i));
        }
        text
    }

    fn batches<'a, L: SkipLog>(
        text: &'a str,
        schema: &'a RowSchema,
        log: L,
        batch_size: usize,
    ) -> BatchIterator<'a, &'a [u8], L> {
        let mut reader = DelimitedReader::new(text.as_bytes(), Dialect::default());
        let header = reader.read_header().unwrap();
        let converter = RowConverter::new(schema, ColumnIndices::resolve(&header, schema).unwrap());
        BatchIterator::new(reader, converter, log, "input.txt", batch_size)
    }

    fn sizes(iter: BatchIterator<'_, &[u8], impl SkipLog>) -> Vec<usize> {
        iter.map(|b| b.unwrap().len()).collect()
    }

    #[test]
    fn test_batch_count_is_ceiling() {
        let schema = schema();
        for (rows, size, expected) in [
            (0, 3, vec![]),
            (1, 3, vec![1]),
            (3, 3, vec![3]),
            (7, 3, vec![3, 3, 1]),
            (9, 3, vec![3, 3, 3]),
        ] {
            let text = input(rows);
            let got = sizes(batches(&text, &schema, MemorySkipLog::new(), size));
            assert_eq!(got, expected, "rows={rows} size={size}");
        }
    }

    #[test]
    fn test_1500_rows_in_batches_of_1000() {
        let schema = schema();
        let text = input(1500);
        assert_eq!(sizes(batches(&text, &schema, MemorySkipLog::new(), 1000)), vec![1000, 500]);
    }

    #[test]
    fn test_has_next_is_idempotent_and_single_pass() {
        let schema = schema();
        let text = input(2);
        let mut iter = batches(&text, &schema, MemorySkipLog::new(), 5);

        assert!(iter.has_next_batch().unwrap());
        assert!(iter.has_next_batch().unwrap());
        assert_eq!(iter.take_next_batch().unwrap().unwrap().len(), 2);
        assert!(!iter.has_next_batch().unwrap());
        assert!(iter.take_next_batch().unwrap().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_skipped_rows_are_logged_with_file_lines() {
        let schema = schema();
        let text = "id;name\n1;a\nx;b\n\n2\n3;c\n";
        let mut log = MemorySkipLog::new();

        let mut iter = batches(text, &schema, &mut log, 10);
        let batch = iter.take_next_batch().unwrap().unwrap();
        assert_eq!(batch.len(), 2);
        assert!(iter.take_next_batch().unwrap().is_none());

        let stats = iter.stats().clone();
        assert_eq!(stats.lines_read, 6);
        assert_eq!(stats.rows_accepted, 2);
        assert_eq!(stats.rows_skipped, 3);
        assert_eq!(stats.skipped_by_reason[&SkipReason::ConversionError], 1);
        assert_eq!(stats.skipped_by_reason[&SkipReason::MalformedRow], 2);
        drop(iter);

        let lines: Vec<String> = log.records().iter().map(|r| r.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "[input.txt] Line 3: conversion error | Data: x;b",
                "[input.txt] Line 4: malformed row (too short) | Data: ",
                "[input.txt] Line 5: malformed row (too short) | Data: 2",
            ]
        );
    }

    #[test]
    fn test_carriage_return_inside_row_keeps_whole_row() {
        let schema = schema();
        let text = "id;name\n1;ab\rcd\n2\r3;x\n";
        let mut log = MemorySkipLog::new();

        let mut iter = batches(text, &schema, &mut log, 10);
        let batch = iter.take_next_batch().unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch[0].values(),
            &[Value::Integer(1), Value::Text("ab\rcd".to_string())]
        );
        drop(iter);

        assert_eq!(log.records().len(), 1);
        assert_eq!(log.records()[0].line, 3);
        assert_eq!(log.records()[0].reason, SkipReason::ConversionError);
        assert_eq!(log.records()[0].raw_data, "2\r3;x");
    }

    #[test]
    fn test_batch_not_emitted_for_only_rejected_rows() {
        let schema = schema();
        let mut log = MemorySkipLog::new();
        let text = "id;name\nbad;a\nworse;b\n";
        assert!(sizes(batches(text, &schema, &mut log, 10)).is_empty());
        assert_eq!(log.records().len(), 2);
    }

    struct BrokenLog;

    impl SkipLog for BrokenLog {
        fn record(&mut self, _record: &SkipRecord) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    #[test]
    fn test_skip_log_failure_does_not_stop_the_file() {
        let schema = schema();
        let text = "id;name\nbad;a\n1;b\n";
        let mut iter = batches(text, &schema, BrokenLog, 10);
        assert_eq!(iter.take_next_batch().unwrap().unwrap().len(), 1);
        assert_eq!(iter.stats().skip_log_failures, 1);
        assert_eq!(iter.stats().rows_skipped, 1);
    }

    #[test]
    fn test_undecodable_row_is_skipped() {
        let schema = schema();
        let bytes: &[u8] = b"id;name\n1;caf\xe9\n2;ok\n";
        let mut reader = DelimitedReader::new(bytes, Dialect::from_label(b';', "utf-8").unwrap());
        let header = reader.read_header().unwrap();
        let converter = RowConverter::new(&schema, ColumnIndices::resolve(&header, &schema).unwrap());
        let mut log = MemorySkipLog::new();

        let mut iter = BatchIterator::new(reader, converter, &mut log, "u.txt", 10);
        assert_eq!(iter.take_next_batch().unwrap().unwrap().len(), 1);
        drop(iter);

        assert_eq!(log.records()[0].reason, SkipReason::EncodingError);
        assert_eq!(log.records()[0].line, 2);
    }
}
