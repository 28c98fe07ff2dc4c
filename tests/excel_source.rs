#![cfg(feature = "excel_test_writer")]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use sqlite_ingest::convert::{ConvertOptions, Converter};
use sqlite_ingest::sink::SqliteSink;
use sqlite_ingest::source::{read_source, ExcelSheetSelection, SourceHandle, SourceOptions};
use sqlite_ingest::types::{RawTable, Scalar};

fn tmp_file(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("book-{name}-{nanos}.xlsx"))
}

/// `Sheet1` holds people, `Empty` nothing, `Teams` a header below a blank row.
fn write_book_xlsx(path: &PathBuf) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();

    let ws = wb.add_worksheet();
    ws.set_name("Sheet1").unwrap();
    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    ws.write_string(0, 2, "score").unwrap();
    ws.write_string(0, 3, "active").unwrap();
    ws.write_number(1, 0, 1).unwrap();
    ws.write_string(1, 1, "Ada").unwrap();
    ws.write_number(1, 2, 98.5).unwrap();
    ws.write_boolean(1, 3, true).unwrap();
    ws.write_number(2, 0, 2).unwrap();
    ws.write_string(2, 1, "Grace").unwrap();
    ws.write_number(2, 2, 87.25).unwrap();
    ws.write_boolean(2, 3, false).unwrap();

    let ws = wb.add_worksheet();
    ws.set_name("Empty").unwrap();

    let ws = wb.add_worksheet();
    ws.set_name("Teams").unwrap();
    ws.write_string(1, 0, "team").unwrap();
    ws.write_string(2, 0, "navy").unwrap();
    ws.write_string(4, 0, "teal").unwrap();

    wb.save(path).unwrap();
}

fn read_tables(path: &PathBuf, selection: ExcelSheetSelection) -> Vec<RawTable> {
    let options = SourceOptions {
        excel_sheet_selection: selection,
        ..Default::default()
    };
    read_source(&SourceHandle::new(path), &options)
        .unwrap()
        .map(Result::unwrap)
        .collect()
}

#[test]
fn every_non_empty_sheet_is_a_table() {
    let path = tmp_file("book");
    write_book_xlsx(&path);

    let tables = read_tables(&path, ExcelSheetSelection::All);
    let labels: Vec<&str> = tables.iter().map(|t| t.table_label.as_str()).collect();
    assert_eq!(labels, ["Sheet1", "Teams"]);

    assert_eq!(tables[0].header, ["id", "name", "score", "active"]);
    assert_eq!(tables[0].rows[0][1], Scalar::text("Ada"));
    assert_eq!(tables[0].rows[1][3], Scalar::Boolean(false));

    // Header is the first non-empty row; blank rows below it are dropped.
    assert_eq!(tables[1].header, ["team"]);
    assert_eq!(tables[1].rows, vec![vec![Scalar::text("navy")], vec![Scalar::text("teal")]]);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn sheet_selection_reads_only_the_named_sheet() {
    let path = tmp_file("select");
    write_book_xlsx(&path);

    let tables = read_tables(&path, ExcelSheetSelection::Sheet("Teams".to_string()));
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].table_label, "Teams");

    let _ = std::fs::remove_file(&path);
}

#[test]
fn workbook_converts_to_one_table_per_sheet() {
    let path = tmp_file("convert");
    write_book_xlsx(&path);
    let stem = path.file_stem().unwrap().to_string_lossy().replace('-', "_");

    let mut conv = Converter::new(SqliteSink::open_in_memory().unwrap(), ConvertOptions::default()).unwrap();
    let report = conv.convert_sources(&[SourceHandle::new(&path)]).unwrap();

    let names: Vec<&str> = report.tables.iter().map(|t| t.table_name.as_str()).collect();
    assert_eq!(names, [format!("{stem}_Sheet1"), format!("{stem}_Teams")]);

    let types: Vec<String> = conv
        .sink()
        .connection()
        .prepare("SELECT type FROM pragma_table_info(?1) ORDER BY cid")
        .unwrap()
        .query_map([names[0]], |r| r.get(0))
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(types, ["INTEGER", "TEXT", "REAL", "INTEGER"]);

    let _ = std::fs::remove_file(&path);
}
