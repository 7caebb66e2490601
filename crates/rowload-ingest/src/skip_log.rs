//! Skip log: append-only record of every rejected row
//!
//! Each rejection becomes one line:
//!
//! ```text
//! [data/a.txt] Line 7: conversion error | Data: 32/13/2024 10:00:00;...
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Why a row was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Row has fewer fields than the highest resolved column index needs
    MalformedRow,
    /// A field failed its column type's parser
    ConversionError,
    /// A field could not be decoded with the configured encoding
    EncodingError,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MalformedRow => "malformed row (too short)",
            SkipReason::ConversionError => "conversion error",
            SkipReason::EncodingError => "encoding error",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rejected row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRecord {
    pub file: String,
    pub line: u64,
    pub raw_data: String,
    pub reason: SkipReason,
}

impl std::fmt::Display for SkipRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] Line {}: {} | Data: {}",
            self.file, self.line, self.reason, self.raw_data
        )
    }
}

/// Destination for skip records
pub trait SkipLog {
    /// Persist one record. Called once per rejected row, in file order.
    fn record(&mut self, record: &SkipRecord) -> io::Result<()>;
}

impl<L: SkipLog + ?Sized> SkipLog for &mut L {
    fn record(&mut self, record: &SkipRecord) -> io::Result<()> {
        (**self).record(record)
    }
}

/// Skip log backed by a text file opened in append mode
#[derive(Debug)]
pub struct FileSkipLog {
    path: PathBuf,
    file: File,
}

impl FileSkipLog {
    /// Open (or create) the log file, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SkipLog for FileSkipLog {
    fn record(&mut self, record: &SkipRecord) -> io::Result<()> {
        // one write per record
        let line = format!("{}\n", record);
        self.file.write_all(line.as_bytes())?;
        self.file.flush()
    }
}

/// Skip log that keeps records in memory
#[derive(Debug, Default)]
pub struct MemorySkipLog {
    records: Vec<SkipRecord>,
}

impl MemorySkipLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SkipRecord] {
        &self.records
    }
}

impl SkipLog for MemorySkipLog {
    fn record(&mut self, record: &SkipRecord) -> io::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}
