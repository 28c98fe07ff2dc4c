//! Unified source entrypoint.
//!
//! Most callers should use [`read_source`], which opens one input artifact and returns its
//! tables as a lazy [`SourceTables`] sequence.
//!
//! - If [`SourceHandle::format`] is `None`, the format is inferred from the file extension.
//! - Multi-table sources (workbooks, SQLite files, keyed JSON) read one table per iteration step.
//! - The sequence is finite and not restartable; reopen the source to read it again.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::types::RawTable;

use super::{csv, ipynb, json, markdown, parquet, sqlite};

/// Supported source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Comma-separated values.
    Csv,
    /// Tab-separated values.
    Tsv,
    /// JSON array-of-objects, keyed object of arrays, single object, or NDJSON.
    Json,
    /// Apache Parquet.
    Parquet,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
    /// Pipe tables in a markdown document.
    Markdown,
    /// An existing SQLite database file.
    Sqlite,
    /// Jupyter notebook.
    Ipynb,
}

impl SourceFormat {
    /// Parse a source format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "tsv" | "tab" => Some(Self::Tsv),
            "json" | "ndjson" | "jsonl" => Some(Self::Json),
            "parquet" | "pq" => Some(Self::Parquet),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            "md" | "markdown" => Some(Self::Markdown),
            "sqlite" | "sqlite3" | "db" => Some(Self::Sqlite),
            "ipynb" => Some(Self::Ipynb),
            _ => None,
        }
    }

    /// Parse a format name as given on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "excel" => Some(Self::Excel),
            "sqlite" => Some(Self::Sqlite),
            "notebook" => Some(Self::Ipynb),
            other => Self::from_extension(other),
        }
    }

    /// Stable lowercase name, as recorded in the source-info table.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Json => "json",
            Self::Parquet => "parquet",
            Self::Excel => "excel",
            Self::Markdown => "markdown",
            Self::Sqlite => "sqlite",
            Self::Ipynb => "ipynb",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How to choose sheet(s) when reading an Excel workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcelSheetSelection {
    /// Every sheet, in workbook order (default).
    #[default]
    All,
    /// A single named sheet.
    Sheet(String),
    /// Only the listed sheets, in the given order.
    Sheets(Vec<String>),
}

/// Default bound on the rows buffered per table.
pub const DEFAULT_MAX_BUFFER_ROWS: usize = 1_000_000;

/// Reader options shared by every source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceOptions {
    /// Field delimiter for delimited text. `None` means `,` for CSV and tab for TSV.
    pub csv_delimiter: Option<u8>,
    /// Excel-specific sheet selection.
    pub excel_sheet_selection: ExcelSheetSelection,
    /// Buffer at most this many rows per table; the rest are read while inserting and are
    /// not seen by type inference. `None` buffers whole tables.
    ///
    /// CSV/TSV and Parquet stop reading at the bound. Whole-document formats (JSON, markdown,
    /// notebooks, workbooks) are parsed in full, so for them the bound only limits inference.
    pub max_buffer_rows: Option<usize>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            csv_delimiter: None,
            excel_sheet_selection: ExcelSheetSelection::All,
            max_buffer_rows: Some(DEFAULT_MAX_BUFFER_ROWS),
        }
    }
}

/// Opaque handle to one input artifact plus an optional format hint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceHandle {
    /// Path to the input file.
    pub path: PathBuf,
    /// Format hint; overrides extension detection when set.
    pub format: Option<SourceFormat>,
}

impl SourceHandle {
    /// Handle with format detected from the extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            format: None,
        }
    }

    /// Handle with an explicit format.
    pub fn with_format(path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Self {
            path: path.into(),
            format: Some(format),
        }
    }

    /// Identifier recorded on every table read from this source.
    pub fn source_id(&self) -> String {
        self.path.display().to_string()
    }

    /// File name without extension; used as the single-table label and multi-table qualifier.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Hinted format, or the one implied by the extension.
    pub fn resolve_format(&self) -> ConvertResult<SourceFormat> {
        match self.format {
            Some(f) => Ok(f),
            None => infer_format_from_path(&self.path),
        }
    }
}

/// Lazy, finite sequence of raw tables produced by one source.
pub struct SourceTables {
    /// Identifier of the source artifact.
    pub source_id: String,
    /// Source stem (file name without extension).
    pub stem: String,
    /// Format the source was read as.
    pub format: SourceFormat,
    /// Whether the source yields (or may yield) more than one table.
    pub multi_table: bool,
    tables: Box<dyn Iterator<Item = ConvertResult<RawTable>>>,
}

impl SourceTables {
    /// Wrap an iterator of tables.
    pub fn new(
        handle: &SourceHandle,
        format: SourceFormat,
        multi_table: bool,
        tables: impl Iterator<Item = ConvertResult<RawTable>> + 'static,
    ) -> Self {
        Self {
            source_id: handle.source_id(),
            stem: handle.stem(),
            format,
            multi_table,
            tables: Box::new(tables),
        }
    }

    /// Wrap already materialized tables; more than one makes the source multi-table.
    pub fn from_tables(handle: &SourceHandle, format: SourceFormat, tables: Vec<RawTable>) -> Self {
        let multi = tables.len() > 1;
        Self::new(handle, format, multi, tables.into_iter().map(Ok))
    }
}

impl Iterator for SourceTables {
    type Item = ConvertResult<RawTable>;

    fn next(&mut self) -> Option<Self::Item> {
        self.tables.next()
    }
}

impl fmt::Debug for SourceTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceTables")
            .field("source_id", &self.source_id)
            .field("format", &self.format)
            .field("multi_table", &self.multi_table)
            .finish()
    }
}

/// Open one source and return its tables.
///
/// Dispatch is chosen by the handle's format hint, falling back to the file extension.
///
/// # Examples
///
/// ```no_run
/// use sqlite_ingest::source::{read_source, SourceFormat, SourceHandle, SourceOptions};
///
/// # fn main() -> Result<(), sqlite_ingest::ConvertError> {
/// // Uses `.csv` to select the CSV reader.
/// for table in read_source(&SourceHandle::new("people.csv"), &SourceOptions::default())? {
///     let table = table?;
///     println!("{}: {} rows", table.table_label, table.row_count());
/// }
///
/// // Force a format for a file without a useful extension.
/// let handle = SourceHandle::with_format("export.txt", SourceFormat::Tsv);
/// let tables = read_source(&handle, &SourceOptions::default())?;
/// println!("multi_table={}", tables.multi_table);
/// # Ok(())
/// # }
/// ```
pub fn read_source(handle: &SourceHandle, options: &SourceOptions) -> ConvertResult<SourceTables> {
    let format = handle.resolve_format()?;
    tracing::debug!(source = %handle.path.display(), %format, "opening source");

    match format {
        SourceFormat::Csv => {
            csv::read_csv_source(handle, format, options.csv_delimiter.unwrap_or(b','), options.max_buffer_rows)
        }
        SourceFormat::Tsv => {
            csv::read_csv_source(handle, format, options.csv_delimiter.unwrap_or(b'\t'), options.max_buffer_rows)
        }
        SourceFormat::Json => json::read_json_source(handle),
        SourceFormat::Parquet => parquet::read_parquet_source(handle, options.max_buffer_rows),
        SourceFormat::Markdown => markdown::read_markdown_source(handle),
        SourceFormat::Sqlite => sqlite::read_sqlite_source(handle),
        SourceFormat::Ipynb => ipynb::read_ipynb_source(handle),
        SourceFormat::Excel => read_excel_dispatch(handle, &options.excel_sheet_selection),
    }
}

fn infer_format_from_path(path: &Path) -> ConvertResult<SourceFormat> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ConvertError::UnsupportedFormat {
            message: format!("cannot infer format: path has no extension ({})", path.display()),
        })?;

    SourceFormat::from_extension(ext).ok_or_else(|| ConvertError::UnsupportedFormat {
        message: format!(
            "cannot infer format from extension '{ext}' for path ({})",
            path.display()
        ),
    })
}

fn read_excel_dispatch(handle: &SourceHandle, sel: &ExcelSheetSelection) -> ConvertResult<SourceTables> {
    #[cfg(feature = "excel")]
    {
        super::excel::read_excel_source(handle, sel)
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = (handle, sel);
        Err(ConvertError::UnsupportedFormat {
            message: "excel sources not enabled (enable cargo feature 'excel')".to_string(),
        })
    }
}

/// Expand command-line inputs into source handles.
///
/// - directories contribute the files with a recognized extension (recursively when
///   `recursive` is set), sorted by path
/// - arguments containing glob metacharacters are expanded with `glob`, sorted by path
/// - anything else is passed through as-is, so unreadable paths surface as source failures
///
/// The result is de-duplicated, keeping first occurrences.
pub fn collect_inputs<P: AsRef<Path>>(inputs: &[P], recursive: bool) -> ConvertResult<Vec<SourceHandle>> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut out = Vec::new();
    let mut push = |path: PathBuf, out: &mut Vec<SourceHandle>| {
        if seen.insert(path.clone()) {
            out.push(SourceHandle::new(path));
        }
    };

    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            let mut walker = walkdir::WalkDir::new(input).sort_by_file_name();
            if !recursive {
                walker = walker.max_depth(1);
            }
            for entry in walker {
                let entry = entry?;
                if entry.file_type().is_file() && has_known_extension(entry.path()) {
                    push(entry.into_path(), &mut out);
                }
            }
            continue;
        }

        let text = input.to_string_lossy();
        if !input.exists() && text.contains(['*', '?', '[']) {
            let mut matches = Vec::new();
            for entry in glob::glob(&text)? {
                let path = entry.map_err(|e| ConvertError::Io(e.into_error()))?;
                if path.is_file() {
                    matches.push(path);
                }
            }
            matches.sort();
            for path in matches {
                push(path, &mut out);
            }
            continue;
        }

        push(input.to_path_buf(), &mut out);
    }
    Ok(out)
}

fn has_known_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(SourceFormat::from_extension)
        .is_some()
}
