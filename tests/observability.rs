use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use sqlite_ingest::convert::{
    ConversionContext, ConversionObserver, ConversionSeverity, ConvertOptions, Converter, FileObserver,
};
use sqlite_ingest::policy::WriteMode;
use sqlite_ingest::report::TableReport;
use sqlite_ingest::sink::SqliteSink;
use sqlite_ingest::source::SourceHandle;
use sqlite_ingest::types::{RawTable, Scalar};
use sqlite_ingest::ConvertError;

#[derive(Default)]
struct RecordingObserver {
    written: Mutex<Vec<String>>,
    skipped: Mutex<Vec<String>>,
    failures: Mutex<Vec<ConversionSeverity>>,
    alerts: Mutex<Vec<ConversionSeverity>>,
}

impl ConversionObserver for RecordingObserver {
    fn on_table_written(&self, report: &TableReport) {
        self.written.lock().unwrap().push(report.table_name.clone());
    }

    fn on_table_skipped(&self, report: &TableReport) {
        self.skipped.lock().unwrap().push(report.table_name.clone());
    }

    fn on_failure(&self, _ctx: &ConversionContext, severity: ConversionSeverity, _error: &ConvertError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &ConversionContext, severity: ConversionSeverity, _error: &ConvertError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

fn observed(obs: Arc<RecordingObserver>, mode: WriteMode) -> Converter<SqliteSink> {
    let opts = ConvertOptions {
        mode,
        record_source_info: false,
        alert_at_or_above: ConversionSeverity::Critical,
        ..Default::default()
    };
    Converter::new(SqliteSink::open_in_memory().unwrap(), opts)
        .unwrap()
        .with_observer(obs)
}

#[test]
fn observer_receives_failure_and_alert_on_missing_file() {
    let obs = Arc::new(RecordingObserver::default());
    let mut conv = observed(obs.clone(), WriteMode::Create);

    // Missing file -> I/O error -> Critical
    conv.convert_sources(&[SourceHandle::new("tests/fixtures/does_not_exist.csv")])
        .unwrap();

    assert_eq!(*obs.failures.lock().unwrap(), vec![ConversionSeverity::Critical]);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![ConversionSeverity::Critical]);
}

#[test]
fn malformed_row_is_a_warning_without_alert() {
    let obs = Arc::new(RecordingObserver::default());
    let mut conv = observed(obs.clone(), WriteMode::Create);

    conv.convert_sources(&[SourceHandle::new("tests/fixtures/measurements.csv")])
        .unwrap();

    assert_eq!(*obs.failures.lock().unwrap(), vec![ConversionSeverity::Warning]);
    assert!(obs.alerts.lock().unwrap().is_empty());
    assert_eq!(*obs.written.lock().unwrap(), vec!["measurements".to_string()]);
}

#[test]
fn written_and_skipped_tables_are_reported() {
    let obs = Arc::new(RecordingObserver::default());
    let mut conv = observed(obs.clone(), WriteMode::Append);
    conv.sink()
        .connection()
        .execute_batch("CREATE TABLE narrow (a TEXT);")
        .unwrap();

    let tables = vec![
        RawTable::new("wide.csv", "wide", vec!["x".into()], vec![vec![Scalar::text("1")]]),
        RawTable::new(
            "narrow.csv",
            "narrow",
            vec!["a".into(), "b".into()],
            vec![vec![Scalar::text("1"), Scalar::text("2")]],
        ),
    ];
    conv.convert_tables(tables).unwrap();

    assert_eq!(*obs.written.lock().unwrap(), vec!["wide".to_string()]);
    assert_eq!(*obs.skipped.lock().unwrap(), vec!["narrow".to_string()]);
    assert!(obs.failures.lock().unwrap().is_empty());
}

#[test]
fn file_observer_appends_one_line_per_event() {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let path = std::env::temp_dir().join(format!("sqlite-ingest-events-{nanos}.log"));

    let opts = ConvertOptions {
        record_source_info: false,
        ..Default::default()
    };
    let mut conv = Converter::new(SqliteSink::open_in_memory().unwrap(), opts)
        .unwrap()
        .with_observer(Arc::new(FileObserver::new(&path)));
    conv.convert_sources(&[
        SourceHandle::new("tests/fixtures/does_not_exist.csv"),
        SourceHandle::new("tests/fixtures/people.csv"),
    ])
    .unwrap();

    let log = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 3, "{log}");
    assert!(lines[0].contains("fail severity=Critical source=tests/fixtures/does_not_exist.csv"));
    assert!(lines[1].contains("ALERT severity=Critical"));
    assert!(lines[2].contains("written table=people action=create rows=2"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn abort_is_reported_once_as_info() {
    let obs = Arc::new(RecordingObserver::default());
    let mut conv = observed(obs.clone(), WriteMode::Create);
    conv.abort_handle().abort();

    let tables = vec![
        RawTable::new("a.csv", "a", vec!["x".into()], vec![vec![Scalar::text("1")]]),
        RawTable::new("b.csv", "b", vec!["x".into()], vec![vec![Scalar::text("2")]]),
    ];
    let report = conv.convert_tables(tables).unwrap();

    assert!(report.aborted);
    assert_eq!(*obs.failures.lock().unwrap(), vec![ConversionSeverity::Info]);
    assert!(obs.alerts.lock().unwrap().is_empty());
    assert!(obs.written.lock().unwrap().is_empty());
}
