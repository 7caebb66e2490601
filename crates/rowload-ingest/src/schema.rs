//! Column schema and typed row values
//!
//! A [`RowSchema`] is the ordered column contract the output conforms to. Its
//! order is the insert order, independent of how any input file lays out its
//! columns.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Semantic type of a declared column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[serde(alias = "timestamp")]
    DateTime,
    #[serde(alias = "int")]
    Integer,
    #[serde(alias = "text")]
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::DateTime => "datetime",
            ColumnType::Integer => "integer",
            ColumnType::String => "string",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Storage width for string columns. Only the sink's DDL uses it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

/// Reasons a column list cannot form a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema must declare at least one column")]
    Empty,

    #[error("column names must not be empty")]
    EmptyName,

    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),

    #[error("column '{column}' is {column_type}; max_length only applies to string columns")]
    LengthOnNonString {
        column: String,
        column_type: ColumnType,
    },

    #[error("column '{0}' has max_length 0")]
    ZeroLength(String),
}

/// Ordered, validated sequence of [`ColumnSpec`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ColumnSpec>", into = "Vec<ColumnSpec>")]
pub struct RowSchema {
    columns: Vec<ColumnSpec>,
}

impl RowSchema {
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self, SchemaError> {
        if columns.is_empty() {
            return Err(SchemaError::Empty);
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if column.name.trim().is_empty() {
                return Err(SchemaError::EmptyName);
            }
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.name.clone()));
            }
            match (column.column_type, column.max_length) {
                (_, None) => {},
                (ColumnType::String, Some(0)) => {
                    return Err(SchemaError::ZeroLength(column.name.clone()));
                },
                (ColumnType::String, Some(_)) => {},
                (column_type, Some(_)) => {
                    return Err(SchemaError::LengthOnNonString {
                        column: column.name.clone(),
                        column_type,
                    });
                },
            }
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in insert order
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

impl TryFrom<Vec<ColumnSpec>> for RowSchema {
    type Error = SchemaError;

    fn try_from(columns: Vec<ColumnSpec>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<RowSchema> for Vec<ColumnSpec> {
    fn from(schema: RowSchema) -> Self {
        schema.columns
    }
}

/// A converted field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    DateTime(NaiveDateTime),
    Integer(i64),
    Text(String),
}

/// One fully converted row: exactly one value per schema column, in schema order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedRow(Vec<Value>);

impl ConvertedRow {
    pub(crate) fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

/// Rows handed to the sink in one insert call
pub type Batch = Vec<ConvertedRow>;
