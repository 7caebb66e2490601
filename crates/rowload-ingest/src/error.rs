//! File-level and run-level ingestion errors
//!
//! Row-level problems never appear here: they become skip records.

use std::path::PathBuf;
use thiserror::Error;

use crate::sink::SinkError;

/// Result type alias for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

#[derive(Error, Debug)]
pub enum IngestError {
    /// A declared column is absent from the file's header
    #[error("Column '{column}' is missing from the header")]
    MissingColumn { column: String },

    #[error("File is empty: no header line")]
    EmptyFile,

    #[error("Header line is not valid {encoding}")]
    HeaderEncoding { encoding: &'static str },

    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to split input line: {0}")]
    Split(#[from] csv::Error),

    #[error("Root directory '{}' does not exist or is not a directory", .0.display())]
    RootNotFound(PathBuf),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

impl IngestError {
    /// Whether this error ends the whole run rather than one file
    pub fn is_run_fatal(&self) -> bool {
        match self {
            IngestError::Sink(err) => err.is_run_fatal(),
            IngestError::RootNotFound(_) => true,
            _ => false,
        }
    }
}
