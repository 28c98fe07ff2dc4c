//! `sqlite-ingest` converts tabular sources into tables of one SQLite database.
//!
//! Every input (CSV/TSV, JSON, Parquet, markdown pipe tables, Excel workbooks, Jupyter
//! notebooks, other SQLite files) is read into [`types::RawTable`]s of untyped cells. For each table the crate infers
//! column types, synthesizes a schema with sanitized identifiers and an optional integer
//! primary key, resolves a unique table name, applies the configured write policy and inserts
//! the rows. Everything that went wrong is collected into a [`report::ConversionReport`]
//! instead of stopping the run.
//!
//! ## What you can convert
//!
//! **File formats (auto-detected by extension):**
//!
//! - **CSV / TSV**: `.csv`, `.tsv`
//! - **JSON**: `.json`, `.ndjson`, `.jsonl` (array of objects, object of arrays, single object, NDJSON)
//! - **Parquet**: `.parquet`, `.pq`
//! - **Markdown**: `.md`, `.markdown` (pipe tables)
//! - **SQLite**: `.sqlite`, `.sqlite3`, `.db`
//! - **Jupyter notebooks**: `.ipynb` (cell sources, outputs and metadata as separate tables)
//! - **Excel/workbooks** (requires the Cargo feature `excel`): `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods`
//!
//! **Column types:**
//!
//! | inferred  | declared  | rule                                                  |
//! |-----------|-----------|-------------------------------------------------------|
//! | `integer` | `INTEGER` | every non-empty value is an integer                   |
//! | `real`    | `REAL`    | every value numeric, at least one non-integral        |
//! | `boolean` | `INTEGER` | every value is `true`/`false` (stored as 1/0)         |
//! | `text`    | `TEXT`    | anything else, including numeric/text conflicts       |
//!
//! Empty cells become `NULL`; a column without empty cells is declared `NOT NULL`.
//!
//! ## Quick example
//!
//! ```no_run
//! use sqlite_ingest::convert::{ConvertOptions, Converter};
//! use sqlite_ingest::policy::WriteMode;
//! use sqlite_ingest::sink::SqliteSink;
//! use sqlite_ingest::source::collect_inputs;
//!
//! # fn main() -> Result<(), sqlite_ingest::ConvertError> {
//! let sources = collect_inputs(&["data/"], true)?;
//! let options = ConvertOptions {
//!     mode: WriteMode::Append,
//!     ..Default::default()
//! };
//! let mut converter = Converter::new(SqliteSink::open("out.sqlite")?, options)?;
//! let report = converter.convert_sources(&sources)?;
//! println!("created={} failed={}", report.counts.created, report.counts.failed);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`source`]: format detection, input collection and per-format readers
//! - [`inference`]: per-column type inference
//! - [`schema`]: identifier sanitization and schema synthesis
//! - [`naming`]: run-scoped table name resolution
//! - [`policy`]: create / overwrite / append / skip decisions
//! - [`sink`]: database sink trait and its SQLite implementation
//! - [`convert`]: the conversion run, its options and observers
//! - [`report`]: run outcome
//! - [`error`]: error type shared by every module

pub mod convert;
pub mod error;
pub mod inference;
pub mod naming;
pub mod policy;
pub mod report;
pub mod schema;
pub mod sink;
pub mod source;
pub mod types;

pub use error::{ConvertError, ConvertResult};
