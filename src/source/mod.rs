//! Source readers.
//!
//! Most callers should use [`read_source`] (from [`unified`]) which:
//!
//! - detects the format from the file extension (or takes it from the [`SourceHandle`] hint)
//! - returns the source's tables as a lazy [`SourceTables`] sequence of [`crate::types::RawTable`]s
//!
//! Format-specific readers are also available under:
//! - [`csv`] (also TSV)
//! - [`json`]
//! - [`parquet`]
//! - [`markdown`]
//! - [`sqlite`]
//! - [`ipynb`]
//! - `excel` (feature `excel`)

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod ipynb;
pub mod json;
pub mod markdown;
pub mod parquet;
pub mod sqlite;
pub mod unified;

pub use unified::{
    collect_inputs, read_source, ExcelSheetSelection, SourceFormat, SourceHandle, SourceOptions, SourceTables,
    DEFAULT_MAX_BUFFER_ROWS,
};
