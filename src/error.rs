use thiserror::Error;

/// Convenience result type for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;

/// Error type returned by source readers, the database sink and the conversion run.
///
/// A single enum is shared across every source format and the SQLite sink. Most variants are
/// recorded in the [`crate::report::ConversionReport`] rather than returned to the caller; only
/// fail-fast runs and setup failures surface them directly.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "excel")]
    /// Excel read error (feature-gated behind `excel`).
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV read error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON read error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parquet read error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// SQLite error not classified as a schema or constraint failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Directory traversal error while collecting inputs.
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Invalid glob pattern among the inputs.
    #[error("glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// Invalid `id_pattern` regular expression.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// The source could not produce any table.
    #[error("failed to read source '{source_id}': {message}")]
    SourceRead { source_id: String, message: String },

    /// No reader exists for the requested or detected format.
    #[error("unsupported format: {message}")]
    UnsupportedFormat { message: String },

    /// A row whose length differs from the header length.
    #[error("malformed row {row}: expected {expected} values, found {found}")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// The sink rejected table creation (name exists, invalid definition).
    #[error("schema error for table '{table}': {message}")]
    Schema { table: String, message: String },

    /// The sink rejected a row (NOT NULL, UNIQUE/PRIMARY KEY or datatype violation).
    ///
    /// `row` is the offset of the rejected row within the batch passed to
    /// [`crate::sink::DatabaseSink::insert_rows`]; rows before it were written.
    #[error("constraint violation in table '{table}' at row {row}: {message}")]
    Constraint {
        table: String,
        row: usize,
        message: String,
    },

    /// Run configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The run was aborted through its [`crate::convert::AbortHandle`].
    #[error("conversion aborted")]
    Aborted,
}

impl ConvertError {
    pub(crate) fn source_read(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceRead {
            source_id: source_id.into(),
            message: message.into(),
        }
    }
}
