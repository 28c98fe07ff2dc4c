//! Core data model types for conversion.
//!
//! Source readers produce [`RawTable`]s of untyped [`Scalar`] cells. Inference turns each column
//! into a [`ColumnProfile`], and schema synthesis turns the profiles into a [`TableSchema`] that
//! the sink can create.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConvertResult;

/// A single untyped cell value as produced by a source reader.
///
/// Text-only formats (CSV, markdown) always produce [`Scalar::Text`]; typed formats (JSON,
/// Excel, Parquet, SQLite) produce the matching variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Missing value.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// Boolean.
    Boolean(bool),
    /// UTF-8 string.
    Text(String),
}

impl Scalar {
    /// Convenience constructor for text cells.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Returns `true` for nulls and whitespace-only text.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Rows of a table that are still in the source, read on demand in order.
pub struct PendingRows(Box<dyn Iterator<Item = ConvertResult<Vec<Scalar>>>>);

impl PendingRows {
    /// Wrap a row iterator.
    pub fn new(rows: impl Iterator<Item = ConvertResult<Vec<Scalar>>> + 'static) -> Self {
        Self(Box::new(rows))
    }
}

impl Iterator for PendingRows {
    type Item = ConvertResult<Vec<Scalar>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }
}

impl fmt::Debug for PendingRows {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingRows(..)")
    }
}

/// One logical table extracted from a source, before inference.
///
/// `rows` is the buffered part of the table. A reader that stops at the row buffer bound
/// leaves the rest in `pending`; those rows are inserted after the buffered ones, but type
/// inference only sees `rows`. A row whose length differs from `header.len()` is malformed and
/// is dropped by the conversion run.
#[derive(Debug)]
pub struct RawTable {
    /// Identifier of the source artifact (usually its path).
    pub source_id: String,
    /// Table label within the source (file stem, sheet name, JSON key, table name...).
    pub table_label: String,
    /// Header cells, in column order.
    pub header: Vec<String>,
    /// Buffered rows, row-major.
    pub rows: Vec<Vec<Scalar>>,
    /// Rows past the buffer bound, not read yet.
    pub pending: Option<PendingRows>,
}

impl RawTable {
    /// Create a fully buffered raw table.
    pub fn new(
        source_id: impl Into<String>,
        table_label: impl Into<String>,
        header: Vec<String>,
        rows: Vec<Vec<Scalar>>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            table_label: table_label.into(),
            header,
            rows,
            pending: None,
        }
    }

    /// Attach rows that follow the buffered ones.
    pub fn with_pending(mut self, pending: PendingRows) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Returns `true` if rows remain past the buffered ones.
    pub fn has_pending_rows(&self) -> bool {
        self.pending.is_some()
    }

    /// Keep at most `max_rows` rows buffered; the rest move in front of any pending rows.
    pub fn bounded(mut self, max_rows: usize) -> Self {
        if self.rows.len() <= max_rows {
            return self;
        }
        let overflow = self.rows.split_off(max_rows).into_iter().map(Ok);
        self.pending = Some(match self.pending.take() {
            Some(rest) => PendingRows::new(overflow.chain(rest)),
            None => PendingRows::new(overflow),
        });
        self
    }

    /// Number of buffered data rows (malformed rows included).
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Semantic type inferred for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredType {
    /// No non-empty value seen yet. Frozen profiles never carry this.
    Null,
    /// Every value is a boolean literal.
    Boolean,
    /// Every value fits an `i64`.
    Integer,
    /// Every value is numeric, at least one is non-integral.
    Real,
    /// Anything else.
    Text,
}

/// Per-column inference summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProfile {
    /// Header cell the profile belongs to (unsanitized).
    pub name: String,
    /// Most general type needed for every observed value.
    pub inferred_type: InferredType,
    /// At least one empty or missing cell was observed (or no value at all).
    pub nullable: bool,
    /// Number of non-empty values observed.
    pub sample_count: usize,
    /// Numeric and non-numeric values were both observed; the column fell back to text.
    pub type_conflict: bool,
    /// No duplicate value was observed while the column was integer-typed.
    pub unique: bool,
    /// Inference stopped before the last row (reduced confidence).
    pub sampled: bool,
}

/// Declared SQLite storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    #[serde(rename = "INTEGER")]
    Integer,
    #[serde(rename = "REAL")]
    Real,
    #[serde(rename = "TEXT")]
    Text,
}

impl SqlType {
    /// SQL keyword used in `CREATE TABLE`.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    /// Map a declared column type back to a storage type using SQLite's affinity rules.
    pub fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Text
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A column of a [`TableSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Sanitized, unique column identifier.
    pub name: String,
    /// Declared storage type.
    pub sql_type: SqlType,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Semantic type the storage type was derived from; drives value coercion on insert.
    pub semantic_type: InferredType,
}

impl ColumnDef {
    /// Create a column definition.
    pub fn new(name: impl Into<String>, semantic_type: InferredType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type_for(semantic_type),
            nullable,
            semantic_type,
        }
    }
}

/// Storage type for a semantic type. Booleans are stored as 0/1 integers.
pub fn sql_type_for(t: InferredType) -> SqlType {
    match t {
        InferredType::Integer | InferredType::Boolean => SqlType::Integer,
        InferredType::Real => SqlType::Real,
        InferredType::Text | InferredType::Null => SqlType::Text,
    }
}

/// Target schema for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// Resolved table name.
    pub table_name: String,
    /// Columns in header order.
    pub columns: Vec<ColumnDef>,
    /// Primary key column, if one was designated.
    pub primary_key: Option<String>,
}

impl TableSchema {
    /// Create a schema.
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnDef>, primary_key: Option<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
            primary_key,
        }
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{RawTable, Scalar};

    fn rows(n: i64) -> Vec<Vec<Scalar>> {
        (0..n).map(|i| vec![Scalar::Integer(i)]).collect()
    }

    #[test]
    fn bounded_moves_overflow_to_pending() {
        let t = RawTable::new("mem", "t", vec!["n".into()], rows(5)).bounded(2);
        assert_eq!(t.rows, rows(2));
        assert!(t.has_pending_rows());
        let rest: Vec<Vec<Scalar>> = t.pending.unwrap().map(Result::unwrap).collect();
        assert_eq!(rest, vec![vec![Scalar::Integer(2)], vec![Scalar::Integer(3)], vec![Scalar::Integer(4)]]);
    }

    #[test]
    fn bounded_within_limit_is_unchanged() {
        let t = RawTable::new("mem", "t", vec!["n".into()], rows(2)).bounded(2);
        assert_eq!(t.rows.len(), 2);
        assert!(!t.has_pending_rows());
    }
}
