use std::error::Error as StdError;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;
use crate::report::TableReport;

/// How bad a conversion failure is; compared against `alert_at_or_above`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (row dropped or rejected, run continues).
    Warning,
    /// Error-level event (a table or source failed).
    Error,
    /// The input or the database could not be accessed at all.
    Critical,
}

/// Where a failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionContext {
    /// Source the failure belongs to.
    pub source_id: String,
    /// Target table, when the failure is table-scoped.
    pub table_name: Option<String>,
}

/// Receives table outcomes and failures as the run progresses.
pub trait ConversionObserver: Send + Sync {
    /// Called after a table was created, overwritten or appended to.
    fn on_table_written(&self, _report: &TableReport) {}

    /// Called when the write policy skipped a table.
    fn on_table_skipped(&self, _report: &TableReport) {}

    /// Called when a source, table or row fails.
    fn on_failure(&self, _ctx: &ConversionContext, _severity: ConversionSeverity, _error: &ConvertError) {}

    /// Called, after `on_failure`, for failures at or above the alert threshold.
    ///
    /// Forwards to [`Self::on_failure`] unless overridden.
    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Classify an error for observers.
pub fn severity_for_error(e: &ConvertError) -> ConversionSeverity {
    match e {
        ConvertError::Io(_) => ConversionSeverity::Critical,
        ConvertError::Parquet(err) => {
            // Parquet errors often wrap IO, but not always in a structured way.
            if error_chain_contains_io(err) {
                ConversionSeverity::Critical
            } else {
                ConversionSeverity::Error
            }
        }
        ConvertError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => ConversionSeverity::Critical,
            _ => ConversionSeverity::Error,
        },
        ConvertError::Sqlite(err) => match err.sqlite_error_code() {
            Some(
                rusqlite::ErrorCode::CannotOpen
                | rusqlite::ErrorCode::DiskFull
                | rusqlite::ErrorCode::SystemIoFailure
                | rusqlite::ErrorCode::ReadOnly
                | rusqlite::ErrorCode::DatabaseCorrupt,
            ) => ConversionSeverity::Critical,
            _ => ConversionSeverity::Error,
        },
        ConvertError::Walk(err) => {
            if err.io_error().is_some() {
                ConversionSeverity::Critical
            } else {
                ConversionSeverity::Error
            }
        }
        ConvertError::MalformedRow { .. } | ConvertError::Constraint { .. } => ConversionSeverity::Warning,
        ConvertError::Aborted => ConversionSeverity::Info,
        _ => ConversionSeverity::Error,
    }
}

fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

/// Forwards every event to each inner observer, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ConversionObserver>>,
}

impl CompositeObserver {
    /// Wrap `observers`.
    pub fn new(observers: Vec<Arc<dyn ConversionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ConversionObserver for CompositeObserver {
    fn on_table_written(&self, report: &TableReport) {
        for o in &self.observers {
            o.on_table_written(report);
        }
    }

    fn on_table_skipped(&self, report: &TableReport) {
        for o in &self.observers {
            o.on_table_skipped(report);
        }
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards conversion events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ConversionObserver for TracingObserver {
    fn on_table_written(&self, report: &TableReport) {
        tracing::info!(
            table = %report.table_name,
            action = %report.action,
            rows = report.rows_written,
            partial = report.partial,
            "table written"
        );
    }

    fn on_table_skipped(&self, report: &TableReport) {
        tracing::warn!(
            table = %report.table_name,
            reason = ?report.reason,
            "table skipped"
        );
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        match severity {
            ConversionSeverity::Info | ConversionSeverity::Warning => tracing::warn!(
                source = %ctx.source_id,
                table = ?ctx.table_name,
                ?severity,
                err = %error,
                "conversion problem"
            ),
            ConversionSeverity::Error | ConversionSeverity::Critical => tracing::error!(
                source = %ctx.source_id,
                table = ?ctx.table_name,
                ?severity,
                err = %error,
                "conversion failure"
            ),
        }
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        tracing::error!(
            alert = true,
            source = %ctx.source_id,
            table = ?ctx.table_name,
            ?severity,
            err = %error,
            "conversion alert"
        );
    }
}

/// Appends conversion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Log events to `path`, one line each. The file is created on first write.
    ///
    /// I/O errors on the log itself are dropped so they never fail a conversion.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl ConversionObserver for FileObserver {
    fn on_table_written(&self, report: &TableReport) {
        self.append_line(&format!(
            "{} written table={} action={} rows={} partial={}",
            unix_ts(),
            report.table_name,
            report.action,
            report.rows_written,
            report.partial
        ));
    }

    fn on_table_skipped(&self, report: &TableReport) {
        self.append_line(&format!(
            "{} skipped table={} reason={}",
            unix_ts(),
            report.table_name,
            report.reason.map(|r| r.to_string()).unwrap_or_default()
        ));
    }

    fn on_failure(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        self.append_line(&format!(
            "{} fail severity={:?} source={} table={} err={}",
            unix_ts(),
            severity,
            ctx.source_id,
            ctx.table_name.as_deref().unwrap_or("-"),
            error
        ));
    }

    fn on_alert(&self, ctx: &ConversionContext, severity: ConversionSeverity, error: &ConvertError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} source={} table={} err={}",
            unix_ts(),
            severity,
            ctx.source_id,
            ctx.table_name.as_deref().unwrap_or("-"),
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::{severity_for_error, ConversionSeverity};
    use crate::ConvertError;

    #[test]
    fn io_is_critical_and_row_problems_are_warnings() {
        let io = ConvertError::Io(std::io::Error::other("disk gone"));
        assert_eq!(severity_for_error(&io), ConversionSeverity::Critical);

        let row = ConvertError::MalformedRow {
            row: 3,
            expected: 3,
            found: 2,
        };
        assert_eq!(severity_for_error(&row), ConversionSeverity::Warning);

        let schema = ConvertError::Schema {
            table: "t".to_string(),
            message: "bad".to_string(),
        };
        assert_eq!(severity_for_error(&schema), ConversionSeverity::Error);
        assert!(ConversionSeverity::Critical > ConversionSeverity::Error);
    }
}
