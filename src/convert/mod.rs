//! Conversion run orchestration.
//!
//! [`Converter`] drives every raw table through inference, schema synthesis, naming and the
//! write policy, and is the only component that talks to the [`DatabaseSink`]. Failures are
//! recorded in the [`ConversionReport`] and reported to the configured
//! [`ConversionObserver`]; only [`ConvertOptions::fail_fast`] runs return them.

mod coerce;
pub mod config;
pub mod observability;

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use crate::error::{ConvertError, ConvertResult};
use crate::inference::infer_profiles;
use crate::naming::{NameRegistry, NamingRequest};
use crate::policy::{decide, DecisionReason, WriteAction, WriteDecision};
use crate::report::{ConversionReport, RowFailure, SourceReport, TableOutcome, TableReport};
use crate::schema::{synthesize_schema, SchemaOptions};
use crate::sink::{DatabaseSink, TableCatalog, TableInfo};
use crate::source::{read_source, SourceFormat, SourceHandle};
use crate::types::{ColumnDef, InferredType, PendingRows, RawTable, Scalar, TableSchema};

use coerce::coerce_row;

pub use config::{ConvertOptions, DEFAULT_BATCH_SIZE};
pub use observability::{
    severity_for_error, CompositeObserver, ConversionContext, ConversionObserver, ConversionSeverity, FileObserver,
    TracingObserver,
};

/// Bookkeeping table listing where every converted table came from.
pub const SOURCE_INFO_TABLE: &str = "_source_info_";

/// Cloneable handle used to stop a running conversion.
///
/// The run checks it before each table and between insert batches. A table interrupted
/// mid-write is rolled back and reported as `skip/aborted`.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    flag: Arc<AtomicBool>,
}

impl AbortHandle {
    /// Request the run to stop.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`AbortHandle::abort`] was called.
    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Where a raw table sits within its source.
struct TablePosition<'a> {
    stem: &'a str,
    index: usize,
    multi_table: bool,
}

/// Source facts recorded in [`SOURCE_INFO_TABLE`].
struct SourceMeta {
    source_id: String,
    dir_name: Option<String>,
    base_name: Option<String>,
    format: Option<SourceFormat>,
    size: Option<i64>,
    mtime: Option<i64>,
}

impl SourceMeta {
    fn gather(source_id: &str, format: Option<SourceFormat>) -> Self {
        let path = Path::new(source_id);
        let metadata = fs::metadata(path).ok();
        Self {
            source_id: source_id.to_string(),
            dir_name: path
                .parent()
                .map(|p| p.display().to_string())
                .filter(|p| !p.is_empty()),
            base_name: path.file_name().map(|n| n.to_string_lossy().into_owned()),
            format,
            size: metadata.as_ref().and_then(|m| i64::try_from(m.len()).ok()),
            mtime: metadata
                .and_then(|m| m.modified().ok())
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .and_then(|d| i64::try_from(d.as_secs()).ok()),
        }
    }

    fn row(&self, dst_table: &str) -> Vec<Scalar> {
        let text = |v: &Option<String>| v.clone().map(Scalar::Text).unwrap_or(Scalar::Null);
        vec![
            Scalar::text(self.source_id.as_str()),
            text(&self.dir_name),
            text(&self.base_name),
            self.format
                .map(|f| Scalar::text(f.name()))
                .unwrap_or(Scalar::Null),
            Scalar::text(dst_table),
            self.size.map(Scalar::Integer).unwrap_or(Scalar::Null),
            self.mtime.map(Scalar::Integer).unwrap_or(Scalar::Null),
        ]
    }
}

fn source_info_schema() -> TableSchema {
    let col = |name: &str, t: InferredType| ColumnDef::new(name, t, true);
    TableSchema::new(
        SOURCE_INFO_TABLE,
        vec![
            col("source_id", InferredType::Text),
            col("dir_name", InferredType::Text),
            col("base_name", InferredType::Text),
            col("format_name", InferredType::Text),
            col("dst_table", InferredType::Text),
            col("size", InferredType::Integer),
            col("mtime", InferredType::Integer),
        ],
        None,
    )
}

/// Mutable state of one run; dropped when the run ends.
struct Run {
    registry: NameRegistry,
    catalog: TableCatalog,
    report: ConversionReport,
}

enum WriteStatus {
    Done,
    Aborted,
}

/// Rows left unread after the buffered prefix, and the source position of the first one.
struct RowStream {
    start: usize,
    rows: PendingRows,
}

/// Converts raw tables into database tables.
///
/// # Examples
///
/// ```no_run
/// use sqlite_ingest::convert::{ConvertOptions, Converter};
/// use sqlite_ingest::sink::SqliteSink;
/// use sqlite_ingest::source::SourceHandle;
///
/// # fn main() -> Result<(), sqlite_ingest::ConvertError> {
/// let sink = SqliteSink::open("out.sqlite")?;
/// let mut converter = Converter::new(sink, ConvertOptions::default())?;
/// let report = converter.convert_sources(&[SourceHandle::new("people.csv")])?;
/// println!("{}", report.to_json()?);
/// # Ok(())
/// # }
/// ```
pub struct Converter<S: DatabaseSink> {
    sink: S,
    options: ConvertOptions,
    schema_options: SchemaOptions,
    observer: Arc<dyn ConversionObserver>,
    abort: AbortHandle,
}

impl<S: DatabaseSink> Converter<S> {
    /// Validate `options` and prepare a converter writing into `sink`.
    ///
    /// Events go to a [`TracingObserver`] until [`Converter::with_observer`] replaces it.
    pub fn new(sink: S, options: ConvertOptions) -> ConvertResult<Self> {
        options.validate()?;
        let schema_options = options.schema_options()?;
        Ok(Self {
            sink,
            options,
            schema_options,
            observer: Arc::new(TracingObserver),
            abort: AbortHandle::default(),
        })
    }

    /// Replace the observer receiving table outcomes and failures.
    pub fn with_observer(mut self, observer: Arc<dyn ConversionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Use an existing abort handle, e.g. one shared with a signal handler.
    pub fn with_abort_handle(mut self, handle: AbortHandle) -> Self {
        self.abort = handle;
        self
    }

    /// Handle that stops this converter's runs.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Run options.
    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Borrow the sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the converter and return the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Convert every table of every source, in order.
    ///
    /// Unreadable sources are recorded and skipped. Once aborted, no further source or table is
    /// read.
    pub fn convert_sources(&mut self, sources: &[SourceHandle]) -> ConvertResult<ConversionReport> {
        let mut run = self.start_run()?;
        for handle in sources {
            if self.abort.is_aborted() {
                let ctx = ConversionContext {
                    source_id: handle.source_id(),
                    table_name: None,
                };
                self.note_abort(&mut run, &ctx);
                break;
            }
            self.convert_source(&mut run, handle)?;
        }
        self.finish_run(run)
    }

    /// Convert in-memory raw tables; each is treated as a single-table source named by its
    /// `source_id`.
    ///
    /// Tables left when the run is aborted are reported as `skip/aborted`.
    pub fn convert_tables(&mut self, tables: impl IntoIterator<Item = RawTable>) -> ConvertResult<ConversionReport> {
        let mut run = self.start_run()?;
        for raw in tables {
            let stem = Path::new(&raw.source_id)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let meta = SourceMeta::gather(&raw.source_id, None);
            let pos = TablePosition {
                stem: &stem,
                index: 0,
                multi_table: false,
            };
            self.convert_table(&mut run, raw, &pos, &meta)?;
        }
        self.finish_run(run)
    }

    fn start_run(&mut self) -> ConvertResult<Run> {
        let catalog = self.sink.list_tables()?;
        tracing::debug!(existing_tables = catalog.len(), mode = %self.options.mode, "starting conversion run");

        let mut registry = NameRegistry::new(self.options.table_name_template.clone());
        if self.options.record_source_info {
            registry.reserve(SOURCE_INFO_TABLE);
        }
        Ok(Run {
            registry,
            catalog,
            report: ConversionReport::new(),
        })
    }

    fn finish_run(&self, mut run: Run) -> ConvertResult<ConversionReport> {
        if self.abort.is_aborted() {
            run.report.aborted = true;
        }
        let c = run.report.counts;
        tracing::info!(
            created = c.created,
            overwritten = c.overwritten,
            appended = c.appended,
            skipped = c.skipped,
            failed = c.failed,
            aborted = run.report.aborted,
            "conversion finished"
        );
        Ok(run.report)
    }

    fn convert_source(&mut self, run: &mut Run, handle: &SourceHandle) -> ConvertResult<()> {
        let source_id = handle.source_id();
        let mut source_report = SourceReport {
            source_id: source_id.clone(),
            format: handle.resolve_format().ok(),
            tables: 0,
            errors: Vec::new(),
        };
        let ctx = ConversionContext {
            source_id: source_id.clone(),
            table_name: None,
        };

        let tables = match read_source(handle, &self.options.source) {
            Ok(tables) => tables,
            Err(e) => {
                source_report.errors.push(e.to_string());
                run.report.record_source(source_report);
                return self.fail(&ctx, e);
            }
        };

        let meta = SourceMeta::gather(&source_id, Some(tables.format));
        let stem = tables.stem.clone();
        let multi_table = tables.multi_table;

        for (index, item) in tables.enumerate() {
            if self.abort.is_aborted() {
                self.note_abort(run, &ctx);
                break;
            }
            match item {
                Ok(raw) => {
                    source_report.tables += 1;
                    let pos = TablePosition {
                        stem: &stem,
                        index,
                        multi_table,
                    };
                    if let Err(e) = self.convert_table(run, raw, &pos, &meta) {
                        run.report.record_source(source_report);
                        return Err(e);
                    }
                }
                Err(e) => {
                    source_report.errors.push(e.to_string());
                    if self.options.fail_fast {
                        run.report.record_source(source_report);
                        return self.fail(&ctx, e);
                    }
                    self.notify_failure(&ctx, &e);
                }
            }
        }

        if source_report.tables == 0 && source_report.errors.is_empty() && !run.report.aborted {
            tracing::warn!(source = %source_id, "no table found in source");
        }
        run.report.record_source(source_report);
        Ok(())
    }

    fn convert_table(
        &mut self,
        run: &mut Run,
        raw: RawTable,
        pos: &TablePosition<'_>,
        meta: &SourceMeta,
    ) -> ConvertResult<()> {
        let naming = NamingRequest {
            source_stem: pos.stem,
            table_label: &raw.table_label,
            table_index: pos.index,
            multi_table: pos.multi_table,
        };

        if self.abort.is_aborted() {
            let name = run.registry.candidate(&naming);
            let mut report = TableReport::new(&raw.source_id, &raw.table_label, &name);
            report.reason = Some(DecisionReason::Aborted);
            report.outcome = TableOutcome::Skipped;
            let ctx = ConversionContext {
                source_id: raw.source_id.clone(),
                table_name: Some(name),
            };
            self.note_abort(run, &ctx);
            run.report.record_table(report);
            return Ok(());
        }

        let table_name = run
            .registry
            .resolve(&naming, &run.catalog, self.options.reuses_existing_names());
        let mut report = TableReport::new(&raw.source_id, &raw.table_label, &table_name);
        let ctx = ConversionContext {
            source_id: raw.source_id.clone(),
            table_name: Some(table_name.clone()),
        };

        if raw.header.is_empty() {
            let e = ConvertError::Schema {
                table: table_name,
                message: "table has no columns".to_string(),
            };
            report.error = Some(e.to_string());
            run.report.record_table(report);
            return self.fail(&ctx, e);
        }

        let raw = match self.options.source.max_buffer_rows {
            Some(limit) => raw.bounded(limit),
            None => raw,
        };

        // Drop malformed rows, keeping each kept row's original position for reporting.
        let RawTable {
            source_id,
            table_label,
            header,
            rows,
            pending,
        } = raw;
        let width = header.len();
        let buffered = rows.len();
        let mut kept = Vec::with_capacity(rows.len());
        let mut row_index = Vec::with_capacity(rows.len());
        for (idx, row) in rows.into_iter().enumerate() {
            if row.len() == width {
                kept.push(row);
                row_index.push(idx);
                continue;
            }
            if let Err(e) = self.drop_malformed(idx, width, row.len(), &ctx, &mut report) {
                report.error = Some(e.to_string());
                run.report.record_table(report);
                return Err(e);
            }
        }
        let mut table = RawTable::new(source_id, table_label, header, kept);
        table.pending = pending;
        if table.has_pending_rows() {
            tracing::warn!(
                table = %table_name,
                buffered,
                "table exceeds the row buffer; types inferred from the buffered rows"
            );
        }

        let profiles = infer_profiles(&table, &self.options.inference_options());
        let stream = table.pending.take().map(|rows| RowStream { start: buffered, rows });
        let schema = synthesize_schema(&table_name, &profiles, &self.schema_options);
        report.rows_read = table.row_count();
        report.sampled = profiles.iter().any(|p| p.sampled);
        report.type_conflicts = schema
            .columns
            .iter()
            .zip(&profiles)
            .filter(|(_, p)| p.type_conflict)
            .map(|(c, _)| c.name.clone())
            .collect();
        if !report.type_conflicts.is_empty() {
            tracing::warn!(
                table = %table_name,
                columns = ?report.type_conflicts,
                "mixed numeric and text values stored as text"
            );
        }
        tracing::debug!(
            table = %table_name,
            columns = schema.columns.len(),
            primary_key = ?schema.primary_key,
            "synthesized schema"
        );

        let decision = decide(&schema, &run.catalog, self.options.mode, self.abort.is_aborted());
        report.action = decision.action;
        report.reason = Some(decision.reason);
        if !decision.writes() {
            report.outcome = TableOutcome::Skipped;
            self.observer.on_table_skipped(&report);
            run.report.record_table(report);
            return Ok(());
        }

        match self.write_table(&schema, &decision, table.rows, &row_index, stream, &ctx, &mut report) {
            Ok(WriteStatus::Done) => {
                report.outcome = TableOutcome::Written;
                if decision.action != WriteAction::Append {
                    run.catalog.insert(TableInfo::from_schema(&schema));
                }
                self.observer.on_table_written(&report);
                run.report.record_table(report);
                if self.options.record_source_info {
                    self.record_source_info(run, meta, &table_name)?;
                }
                Ok(())
            }
            Ok(WriteStatus::Aborted) => {
                let aborted = WriteDecision::aborted(&table_name);
                report.action = aborted.action;
                report.reason = Some(aborted.reason);
                report.outcome = TableOutcome::Skipped;
                report.rows_written = 0;
                report.failed_rows.clear();
                report.partial = false;
                self.note_abort(run, &ctx);
                self.observer.on_table_skipped(&report);
                run.report.record_table(report);
                Ok(())
            }
            Err(e) => {
                report.outcome = TableOutcome::Failed;
                report.rows_written = 0;
                report.error = Some(e.to_string());
                run.report.record_table(report);
                self.fail(&ctx, e)
            }
        }
    }

    /// Apply one write decision inside the sink's table transaction.
    fn write_table(
        &mut self,
        schema: &TableSchema,
        decision: &WriteDecision,
        rows: Vec<Vec<Scalar>>,
        row_index: &[usize],
        stream: Option<RowStream>,
        ctx: &ConversionContext,
        report: &mut TableReport,
    ) -> ConvertResult<WriteStatus> {
        self.sink.begin_table()?;
        let result = self.write_table_rows(schema, decision, rows, row_index, stream, ctx, report);
        match result {
            Ok(WriteStatus::Done) => {
                self.sink.commit_table()?;
                Ok(WriteStatus::Done)
            }
            Ok(WriteStatus::Aborted) => {
                tracing::warn!(table = %schema.table_name, "aborted mid-table, rolling back");
                self.sink.rollback_table()?;
                Ok(WriteStatus::Aborted)
            }
            Err(e) => {
                if let Err(rollback) = self.sink.rollback_table() {
                    tracing::error!(table = %schema.table_name, err = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    fn write_table_rows(
        &mut self,
        schema: &TableSchema,
        decision: &WriteDecision,
        rows: Vec<Vec<Scalar>>,
        row_index: &[usize],
        stream: Option<RowStream>,
        ctx: &ConversionContext,
        report: &mut TableReport,
    ) -> ConvertResult<WriteStatus> {
        match decision.action {
            WriteAction::Create => self.sink.create_table(schema)?,
            WriteAction::Overwrite => {
                self.sink.drop_table(&schema.table_name)?;
                self.sink.create_table(schema)?;
            }
            WriteAction::Append | WriteAction::Skip => {}
        }

        let columns: Vec<String> = schema.column_names().map(str::to_string).collect();
        let coerced: Vec<Vec<Scalar>> = rows
            .into_iter()
            .map(|row| coerce_row(row, &schema.columns))
            .collect();

        let batch_size = self.options.batch_size;
        for (batch_no, chunk) in coerced.chunks(batch_size).enumerate() {
            if self.abort.is_aborted() {
                return Ok(WriteStatus::Aborted);
            }
            let base = batch_no * batch_size;
            self.insert_batch(&schema.table_name, &columns, chunk, &row_index[base..], ctx, report)?;
        }

        let Some(RowStream { start, rows }) = stream else {
            return Ok(WriteStatus::Done);
        };
        let width = columns.len();
        let mut batch = Vec::with_capacity(batch_size);
        let mut batch_index = Vec::with_capacity(batch_size);
        for (offset, row) in rows.enumerate() {
            let idx = start + offset;
            let row = row?;
            if row.len() != width {
                self.drop_malformed(idx, width, row.len(), ctx, report)?;
                continue;
            }
            report.rows_read += 1;
            batch.push(coerce_row(row, &schema.columns));
            batch_index.push(idx);
            if batch.len() == batch_size {
                if self.abort.is_aborted() {
                    return Ok(WriteStatus::Aborted);
                }
                self.insert_batch(&schema.table_name, &columns, &batch, &batch_index, ctx, report)?;
                batch.clear();
                batch_index.clear();
            }
        }
        if !batch.is_empty() {
            if self.abort.is_aborted() {
                return Ok(WriteStatus::Aborted);
            }
            self.insert_batch(&schema.table_name, &columns, &batch, &batch_index, ctx, report)?;
        }
        Ok(WriteStatus::Done)
    }

    /// Count a row whose width differs from the header; return it only in fail-fast mode.
    fn drop_malformed(
        &self,
        row: usize,
        expected: usize,
        found: usize,
        ctx: &ConversionContext,
        report: &mut TableReport,
    ) -> ConvertResult<()> {
        report.malformed_rows += 1;
        let e = ConvertError::MalformedRow { row, expected, found };
        if self.options.fail_fast {
            return Err(e);
        }
        self.notify_failure(ctx, &e);
        Ok(())
    }

    /// Insert one batch; a rejected row is recorded and the rest of the batch is retried row
    /// by row.
    fn insert_batch(
        &mut self,
        table: &str,
        columns: &[String],
        chunk: &[Vec<Scalar>],
        row_index: &[usize],
        ctx: &ConversionContext,
        report: &mut TableReport,
    ) -> ConvertResult<()> {
        let (failed_at, message) = match self.sink.insert_rows(table, columns, chunk) {
            Ok(n) => {
                report.rows_written += n;
                return Ok(());
            }
            Err(ConvertError::Constraint { row, message, .. }) => (row, message),
            Err(e) => return Err(e),
        };
        report.rows_written += failed_at;
        self.reject_row(table, row_index[failed_at], message, ctx, report)?;

        for (offset, row) in chunk.iter().enumerate().skip(failed_at + 1) {
            match self.sink.insert_rows(table, columns, std::slice::from_ref(row)) {
                Ok(n) => report.rows_written += n,
                Err(ConvertError::Constraint { message, .. }) => {
                    self.reject_row(table, row_index[offset], message, ctx, report)?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn reject_row(
        &self,
        table: &str,
        row: usize,
        message: String,
        ctx: &ConversionContext,
        report: &mut TableReport,
    ) -> ConvertResult<()> {
        report.partial = true;
        report.failed_rows.push(RowFailure {
            row,
            message: message.clone(),
        });
        let e = ConvertError::Constraint {
            table: table.to_string(),
            row,
            message,
        };
        if self.options.fail_fast {
            return Err(e);
        }
        self.notify_failure(ctx, &e);
        Ok(())
    }

    fn record_source_info(&mut self, run: &mut Run, meta: &SourceMeta, table_name: &str) -> ConvertResult<()> {
        match self.append_source_info(&mut run.catalog, meta, table_name) {
            Ok(()) => Ok(()),
            Err(e) => {
                let ctx = ConversionContext {
                    source_id: meta.source_id.clone(),
                    table_name: Some(SOURCE_INFO_TABLE.to_string()),
                };
                self.fail(&ctx, e)
            }
        }
    }

    fn append_source_info(&mut self, catalog: &mut TableCatalog, meta: &SourceMeta, table_name: &str) -> ConvertResult<()> {
        let schema = source_info_schema();
        if !catalog.contains(SOURCE_INFO_TABLE) {
            self.sink.create_table(&schema)?;
            catalog.insert(TableInfo::from_schema(&schema));
        }
        let columns: Vec<String> = schema.column_names().map(str::to_string).collect();
        self.sink
            .insert_rows(SOURCE_INFO_TABLE, &columns, &[meta.row(table_name)])?;
        Ok(())
    }

    /// Mark the run aborted, notifying the observer the first time.
    fn note_abort(&self, run: &mut Run, ctx: &ConversionContext) {
        if !run.report.aborted {
            tracing::info!(source = %ctx.source_id, "conversion aborted");
            self.notify_failure(ctx, &ConvertError::Aborted);
        }
        run.report.aborted = true;
    }

    fn notify_failure(&self, ctx: &ConversionContext, e: &ConvertError) {
        let severity = severity_for_error(e);
        self.observer.on_failure(ctx, severity, e);
        if severity >= self.options.alert_at_or_above {
            self.observer.on_alert(ctx, severity, e);
        }
    }

    /// Report `e`; return it only in fail-fast mode.
    fn fail(&self, ctx: &ConversionContext, e: ConvertError) -> ConvertResult<()> {
        self.notify_failure(ctx, &e);
        if self.options.fail_fast {
            Err(e)
        } else {
            Ok(())
        }
    }
}

impl<S: DatabaseSink> std::fmt::Debug for Converter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("options", &self.options)
            .field("aborted", &self.abort.is_aborted())
            .finish()
    }
}
