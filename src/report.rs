//! Conversion run report.
//!
//! Built by the orchestrator while the run progresses; read-only once
//! [`crate::convert::Converter::convert_sources`] returns it.

use serde::Serialize;

use crate::error::ConvertResult;
use crate::policy::{DecisionReason, WriteAction};
use crate::source::SourceFormat;

/// One row that could not be inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// 0-based index of the row among the table's data rows (header excluded).
    pub row: usize,
    pub message: String,
}

/// Final state of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOutcome {
    /// The decision's write happened (possibly partially, see [`TableReport::partial`]).
    Written,
    /// The write policy chose not to write.
    Skipped,
    /// Table creation or the write itself failed.
    Failed,
}

/// Everything recorded about one raw table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub source_id: String,
    pub table_label: String,
    /// Resolved target table name.
    pub table_name: String,
    pub action: WriteAction,
    /// `None` when the table failed before a decision was made.
    pub reason: Option<DecisionReason>,
    pub outcome: TableOutcome,
    /// Well-formed rows handed to the write.
    pub rows_read: usize,
    pub rows_written: usize,
    /// Rows dropped because their length differed from the header's.
    pub malformed_rows: usize,
    pub failed_rows: Vec<RowFailure>,
    /// Columns whose values mixed numeric and non-numeric kinds.
    pub type_conflicts: Vec<String>,
    /// Inference looked at a prefix of the rows only.
    pub sampled: bool,
    /// Some rows were rejected by the database.
    pub partial: bool,
    pub error: Option<String>,
}

impl TableReport {
    pub(crate) fn new(source_id: &str, table_label: &str, table_name: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            table_label: table_label.to_string(),
            table_name: table_name.to_string(),
            action: WriteAction::Skip,
            reason: None,
            outcome: TableOutcome::Failed,
            rows_read: 0,
            rows_written: 0,
            malformed_rows: 0,
            failed_rows: Vec::new(),
            type_conflicts: Vec::new(),
            sampled: false,
            partial: false,
            error: None,
        }
    }
}

/// What happened to one input artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    /// `None` when the format could not be determined.
    pub format: Option<SourceFormat>,
    /// Number of raw tables the source produced.
    pub tables: usize,
    /// Read errors; a source with errors and zero tables was skipped.
    pub errors: Vec<String>,
}

/// Table counts by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub created: usize,
    pub overwritten: usize,
    pub appended: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Aggregate outcome of one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionReport {
    pub counts: ReportCounts,
    pub tables: Vec<TableReport>,
    pub sources: Vec<SourceReport>,
    /// The run was stopped through its abort handle.
    pub aborted: bool,
}

impl ConversionReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_table(&mut self, table: TableReport) {
        match (table.outcome, table.action) {
            (TableOutcome::Failed, _) => self.counts.failed += 1,
            (TableOutcome::Skipped, _) | (_, WriteAction::Skip) => self.counts.skipped += 1,
            (TableOutcome::Written, WriteAction::Create) => self.counts.created += 1,
            (TableOutcome::Written, WriteAction::Overwrite) => self.counts.overwritten += 1,
            (TableOutcome::Written, WriteAction::Append) => self.counts.appended += 1,
        }
        self.tables.push(table);
    }

    pub(crate) fn record_source(&mut self, source: SourceReport) {
        self.sources.push(source);
    }

    /// First table report with this target name (case-insensitive).
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.table_name.eq_ignore_ascii_case(name))
    }

    /// Total rows written across all tables.
    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(|t| t.rows_written).sum()
    }

    /// Returns `true` if nothing failed, no row was dropped or rejected and no source errored.
    pub fn is_clean(&self) -> bool {
        self.counts.failed == 0
            && self
                .tables
                .iter()
                .all(|t| !t.partial && t.malformed_rows == 0)
            && self.sources.iter().all(|s| s.errors.is_empty())
    }

    /// Returns `true` if no table failed and every source was read; decides the CLI exit code.
    ///
    /// Dropped or rejected rows do not count; see [`ConversionReport::is_clean`].
    pub fn succeeded(&self) -> bool {
        self.counts.failed == 0 && self.sources.iter().all(|s| s.errors.is_empty())
    }

    /// Pretty-printed JSON summary.
    pub fn to_json(&self) -> ConvertResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
