//! Header resolution
//!
//! Maps each schema column to its position in one file's header. Indices are
//! resolved once per file and never reused across files.

use crate::error::IngestError;
use crate::schema::RowSchema;

/// Position of every schema column in a raw row, in schema order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnIndices(Vec<usize>);

impl ColumnIndices {
    /// Resolve schema columns against a header record
    ///
    /// Names are compared after trimming. When a header repeats a name, the
    /// first occurrence is used.
    pub fn resolve<S: AsRef<str>>(header: &[S], schema: &RowSchema) -> Result<Self, IngestError> {
        schema
            .columns()
            .iter()
            .map(|column| {
                header
                    .iter()
                    .position(|h| h.as_ref().trim() == column.name)
                    .ok_or_else(|| IngestError::MissingColumn {
                        column: column.name.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Minimum field count a row needs to cover every resolved index
    pub fn required_width(&self) -> usize {
        self.0.iter().max().map_or(0, |max| max + 1)
    }
}
