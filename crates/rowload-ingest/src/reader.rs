//! Delimited text reader
//!
//! Input is line-oriented: every physical line is one record, so line numbers
//! stay exact for blank and malformed lines alike. Each line is split with
//! the `csv` crate (double-quote quoting, rows of any width) and every field
//! is decoded with the deployment's character encoding.

use encoding_rs::Encoding;
use std::io::{BufRead, BufReader, Read};

use crate::error::IngestError;

/// How input files are split and decoded
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

impl Dialect {
    pub fn new(delimiter: u8, encoding: &'static Encoding) -> Self {
        Self { delimiter, encoding }
    }

    /// Resolve an encoding from its WHATWG label ("latin-1", "utf-8", ...)
    pub fn from_label(delimiter: u8, label: &str) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(|encoding| Self::new(delimiter, encoding))
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self::new(b';', encoding_rs::WINDOWS_1252)
    }
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// 1-based line number; the header is line 1
    pub line: u64,
    pub fields: Vec<String>,
    /// At least one field held bytes invalid in the configured encoding;
    /// `fields` then contains a lossy rendering.
    pub lossy: bool,
}

impl RawRecord {
    /// Fields re-joined with the delimiter, as written to the skip log
    pub fn joined(&self, delimiter: u8) -> String {
        let mut buf = [0; 4];
        let separator: &str = char::from(delimiter).encode_utf8(&mut buf);
        self.fields.join(separator)
    }
}

/// Record reader over one input source
pub struct DelimitedReader<R: Read> {
    source: BufReader<R>,
    splitter: csv::ReaderBuilder,
    line_buf: Vec<u8>,
    record: csv::ByteRecord,
    line: u64,
    dialect: Dialect,
}

impl<R: Read> DelimitedReader<R> {
    pub fn new(source: R, dialect: Dialect) -> Self {
        let mut splitter = csv::ReaderBuilder::new();
        splitter
            .delimiter(dialect.delimiter)
            // lines are already split on '\n'; a stray '\r' is field data
            .terminator(csv::Terminator::Any(b'\n'))
            .has_headers(false)
            .flexible(true);

        Self {
            source: BufReader::new(source),
            splitter,
            line_buf: Vec::new(),
            record: csv::ByteRecord::new(),
            line: 0,
            dialect,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Read the header record. Must be called once, before any data record.
    pub fn read_header(&mut self) -> Result<Vec<String>, IngestError> {
        let header = self.next_record()?.ok_or(IngestError::EmptyFile)?;
        if header.lossy {
            return Err(IngestError::HeaderEncoding {
                encoding: self.dialect.encoding.name(),
            });
        }

        let mut fields = header.fields;
        if let Some(first) = fields.first_mut() {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.to_string();
            }
        }
        Ok(fields)
    }

    /// Read the next line as a record, or `None` at end of input
    ///
    /// A blank line yields a record with no fields.
    pub fn next_record(&mut self) -> Result<Option<RawRecord>, IngestError> {
        self.line_buf.clear();
        if self.source.read_until(b'\n', &mut self.line_buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;

        let mut content = self.line_buf.as_slice();
        if let Some(rest) = content.strip_suffix(b"\n") {
            content = rest;
        }
        if let Some(rest) = content.strip_suffix(b"\r") {
            content = rest;
        }

        self.record.clear();
        if !content.is_empty() {
            let mut split = self
                .splitter
                .buffer_capacity(content.len() + 1)
                .from_reader(content);
            split.read_byte_record(&mut self.record)?;
        }

        let encoding = self.dialect.encoding;
        let mut lossy = false;
        let fields = self
            .record
            .iter()
            .map(|bytes| match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
                Some(text) => text.into_owned(),
                None => {
                    lossy = true;
                    encoding.decode_without_bom_handling(bytes).0.into_owned()
                },
            })
            .collect();

        Ok(Some(RawRecord {
            line: self.line,
            fields,
            lossy,
        }))
    }
}
