use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use sqlite_ingest::source::{collect_inputs, read_source, SourceFormat, SourceHandle, SourceOptions};
use sqlite_ingest::types::{RawTable, Scalar};
use sqlite_ingest::ConvertError;

fn tmp_file(ext: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("sqlite-ingest-source-{nanos}.{ext}"))
}

fn read_all(handle: &SourceHandle) -> (bool, Vec<RawTable>) {
    let tables = read_source(handle, &SourceOptions::default()).unwrap();
    let multi = tables.multi_table;
    (multi, tables.map(Result::unwrap).collect())
}

fn write_people_parquet(path: &PathBuf) {
    let schema_str = r#"
    message schema {
      REQUIRED INT64 id;
      REQUIRED BINARY name (UTF8);
      REQUIRED DOUBLE score;
      REQUIRED BOOLEAN active;
    }
    "#;

    let schema = Arc::new(parse_message_type(schema_str).unwrap());
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path).unwrap();
    let mut writer = SerializedFileWriter::new(file, schema, props).unwrap();

    let mut rg = writer.next_row_group().unwrap();
    while let Some(mut col) = rg.next_column().unwrap() {
        match col.untyped() {
            ColumnWriter::Int64ColumnWriter(w) => {
                w.write_batch(&[1_i64, 2_i64], None, None).unwrap();
            }
            ColumnWriter::ByteArrayColumnWriter(w) => {
                let names = [ByteArray::from("Ada"), ByteArray::from("Grace")];
                w.write_batch(&names, None, None).unwrap();
            }
            ColumnWriter::DoubleColumnWriter(w) => {
                w.write_batch(&[98.5_f64, 87.25_f64], None, None).unwrap();
            }
            ColumnWriter::BoolColumnWriter(w) => {
                w.write_batch(&[true, false], None, None).unwrap();
            }
            _ => panic!("unexpected column writer in test"),
        }
        col.close().unwrap();
    }
    rg.close().unwrap();
    writer.close().unwrap();
}

#[test]
fn csv_by_extension_is_a_single_text_table() {
    let (multi, tables) = read_all(&SourceHandle::new("tests/fixtures/people.csv"));
    assert!(!multi);
    assert_eq!(tables.len(), 1);
    let t = &tables[0];
    assert_eq!(t.table_label, "people");
    assert_eq!(t.header, ["id", "name", "score", "active"]);
    assert_eq!(t.rows[0][1], Scalar::text("Ada"));
    assert_eq!(t.source_id, "tests/fixtures/people.csv");
}

#[test]
fn tsv_uses_tab_delimiter() {
    let (_, tables) = read_all(&SourceHandle::new("tests/fixtures/people.tsv"));
    assert_eq!(tables[0].header, ["id", "name", "city"]);
    assert_eq!(tables[0].rows[1][2], Scalar::text("New York"));
}

#[test]
fn format_hint_overrides_extension() {
    let handle = SourceHandle::with_format("tests/fixtures/people.tsv", SourceFormat::Csv);
    let (_, tables) = read_all(&handle);
    // Read as comma-separated, the whole line is one field.
    assert_eq!(tables[0].header.len(), 1);
}

#[test]
fn csv_keeps_malformed_rows_for_the_run_to_drop() {
    let (_, tables) = read_all(&SourceHandle::new("tests/fixtures/measurements.csv"));
    let widths: Vec<usize> = tables[0].rows.iter().map(Vec::len).collect();
    assert_eq!(widths, [3, 2, 3]);
}

#[test]
fn json_array_has_typed_cells_and_nested_values_as_text() {
    let (_, tables) = read_all(&SourceHandle::new("tests/fixtures/people.json"));
    let t = &tables[0];
    assert_eq!(t.header, ["id", "user", "score", "active", "team"]);
    assert_eq!(t.rows[0][0], Scalar::Integer(1));
    assert_eq!(t.rows[0][1], Scalar::text(r#"{"name":"Ada"}"#));
    assert_eq!(t.rows[0][3], Scalar::Boolean(true));
    assert_eq!(t.rows[0][4], Scalar::Null);
    assert_eq!(t.rows[1][4], Scalar::text("navy"));
}

#[test]
fn json_object_of_arrays_is_multi_table() {
    let (multi, tables) = read_all(&SourceHandle::new("tests/fixtures/shop.json"));
    assert!(multi);
    let labels: Vec<&str> = tables.iter().map(|t| t.table_label.as_str()).collect();
    assert_eq!(labels, ["customers", "orders"]);
    assert_eq!(tables[1].rows[2][2], Scalar::Null);
}

#[test]
fn ndjson_by_extension() {
    let (_, tables) = read_all(&SourceHandle::new("tests/fixtures/events.ndjson"));
    assert_eq!(tables[0].header, ["event", "user", "duration"]);
    assert_eq!(tables[0].rows[1][2], Scalar::Integer(42));
}

#[test]
fn markdown_document_with_two_tables() {
    let (multi, tables) = read_all(&SourceHandle::new("tests/fixtures/release_notes.md"));
    assert!(multi);
    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].header, ["os", "arch", "tier"]);
    assert_eq!(tables[0].rows.len(), 3);
    assert_eq!(tables[1].rows[1][1], Scalar::text("pipe | in names is escaped"));
}

#[test]
fn notebook_yields_cell_and_metadata_tables() {
    let (multi, tables) = read_all(&SourceHandle::new("tests/fixtures/analysis.ipynb"));
    assert!(multi);
    let labels: Vec<&str> = tables.iter().map(|t| t.table_label.as_str()).collect();
    assert_eq!(
        labels,
        [
            "cells_source",
            "cells_outputs",
            "cells_outputs_kv",
            "cells_kv",
            "metadata_kernelspec",
            "metadata_language_info",
            "kv"
        ]
    );
    assert_eq!(tables[0].rows.len(), 4);
    assert_eq!(
        tables[0].rows[2],
        vec![Scalar::Integer(1), Scalar::Integer(1), Scalar::text("print(total)")]
    );
    assert_eq!(tables[1].rows[0][3], Scalar::text("42"));
    assert_eq!(tables[3].rows.len(), 5);
}

#[test]
fn parquet_by_extension() {
    let path = tmp_file("parquet");
    write_people_parquet(&path);

    let (_, tables) = read_all(&SourceHandle::new(&path));
    let t = &tables[0];
    assert_eq!(t.header, ["id", "name", "score", "active"]);
    assert_eq!(
        t.rows[1],
        vec![
            Scalar::Integer(2),
            Scalar::text("Grace"),
            Scalar::Real(87.25),
            Scalar::Boolean(false)
        ]
    );

    let _ = std::fs::remove_file(&path);
}

fn read_bounded(handle: &SourceHandle, max_buffer_rows: usize) -> RawTable {
    let options = SourceOptions {
        max_buffer_rows: Some(max_buffer_rows),
        ..Default::default()
    };
    read_source(handle, &options).unwrap().next().unwrap().unwrap()
}

#[test]
fn csv_past_the_row_buffer_leaves_rows_pending() {
    let path = tmp_file("csv");
    std::fs::write(&path, "n\n1\n2\n3\n4\n").unwrap();

    let t = read_bounded(&SourceHandle::new(&path), 2);
    assert_eq!(t.rows, vec![vec![Scalar::text("1")], vec![Scalar::text("2")]]);
    assert!(t.has_pending_rows());
    let rest: Vec<Vec<Scalar>> = t.pending.unwrap().map(Result::unwrap).collect();
    assert_eq!(rest, vec![vec![Scalar::text("3")], vec![Scalar::text("4")]]);

    let t = read_bounded(&SourceHandle::new(&path), 4);
    assert_eq!(t.rows.len(), 4);
    assert!(!t.has_pending_rows());

    let _ = std::fs::remove_file(&path);
}

#[test]
fn parquet_past_the_row_buffer_leaves_rows_pending() {
    let path = tmp_file("parquet");
    write_people_parquet(&path);

    let t = read_bounded(&SourceHandle::new(&path), 1);
    assert_eq!(t.rows.len(), 1);
    let rest: Vec<Vec<Scalar>> = t.pending.unwrap().map(Result::unwrap).collect();
    assert_eq!(rest[0][1], Scalar::text("Grace"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn sqlite_file_yields_every_user_table() {
    let path = tmp_file("sqlite");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE b (k INTEGER, v BLOB);
             INSERT INTO b VALUES (1, x'beef');
             CREATE TABLE a (name TEXT);
             INSERT INTO a VALUES ('x'), (NULL);",
        )
        .unwrap();
    }

    let (multi, tables) = read_all(&SourceHandle::new(&path));
    assert!(multi);
    let labels: Vec<&str> = tables.iter().map(|t| t.table_label.as_str()).collect();
    assert_eq!(labels, ["a", "b"]);
    assert_eq!(tables[0].rows[1], vec![Scalar::Null]);
    assert_eq!(tables[1].rows[0], vec![Scalar::Integer(1), Scalar::text("beef")]);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn unknown_extension_is_unsupported() {
    let err = read_source(&SourceHandle::new("tests/fixtures/nested/readme.txt"), &SourceOptions::default())
        .unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedFormat { .. }));
}

#[test]
fn missing_file_is_io_error() {
    let err = read_source(&SourceHandle::new("tests/fixtures/does_not_exist.csv"), &SourceOptions::default())
        .unwrap_err();
    assert!(matches!(err, ConvertError::Csv(_) | ConvertError::Io(_)), "{err:?}");
}

#[test]
fn empty_csv_yields_no_tables() {
    let path = tmp_file("csv");
    std::fs::write(&path, "").unwrap();
    let (_, tables) = read_all(&SourceHandle::new(&path));
    assert!(tables.is_empty());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn collect_inputs_expands_directories_and_globs() {
    let flat = collect_inputs(&["tests/fixtures/nested"], false).unwrap();
    let flat: Vec<PathBuf> = flat.into_iter().map(|h| h.path).collect();
    assert_eq!(flat, [PathBuf::from("tests/fixtures/nested/top.csv")]);

    let deep = collect_inputs(&["tests/fixtures/nested"], true).unwrap();
    assert_eq!(deep.len(), 2);

    let globbed = collect_inputs(&["tests/fixtures/people.*", "tests/fixtures/people.csv"], false).unwrap();
    let names: Vec<String> = globbed
        .iter()
        .map(|h| h.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["people.csv", "people.json", "people.tsv"]);
}
