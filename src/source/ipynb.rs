//! Jupyter notebook (`.ipynb`, nbformat 4) reader.
//!
//! A notebook is always a multi-table source. Tables without rows are not produced.
//!
//! | label                    | columns                          | rows                                   |
//! |--------------------------|----------------------------------|----------------------------------------|
//! | `cells_source`           | `cell_id, line_no, text`         | one per source line                    |
//! | `cells_outputs`          | `cell_id, type, line_no, data`   | one per output text line / data line   |
//! | `cells_outputs_kv`       | `cell_id, key, value`            | remaining output fields                |
//! | `cells_kv`               | `cell_id, key, value`            | remaining cell fields                  |
//! | `metadata_kernelspec`    | `key, value`                     | kernelspec entries                     |
//! | `metadata_language_info` | `key, value`                     | language info, `codemirror_mode_*` flattened |
//! | `metadata_kv`            | `key, value`                     | `anaconda-cloud` entries               |
//! | `kv`                     | `key, value`                     | `nbformat`, `nbformat_minor`           |
//!
//! `image/*` output data is kept whole in one row; other data is split into lines, with JSON
//! objects pretty-printed first.

use std::fs;

use serde_json::{Map, Value};

use crate::error::{ConvertError, ConvertResult};
use crate::types::{RawTable, Scalar};

use super::unified::{SourceFormat, SourceHandle, SourceTables};

/// Read a notebook file as a source.
pub fn read_ipynb_source(handle: &SourceHandle) -> ConvertResult<SourceTables> {
    let text = fs::read_to_string(&handle.path)?;
    let tables = read_ipynb_tables(&text, &handle.source_id())?;
    Ok(SourceTables::new(handle, SourceFormat::Ipynb, true, tables.into_iter().map(Ok)))
}

/// Parse notebook JSON into raw tables.
pub fn read_ipynb_tables(input: &str, source_id: &str) -> ConvertResult<Vec<RawTable>> {
    let doc: Value = serde_json::from_str(input)?;
    let Value::Object(notebook) = doc else {
        return Err(ConvertError::source_read(source_id, "notebook must be a json object"));
    };

    let mut cells = CellTables::default();
    if let Some(items) = notebook.get("cells").and_then(Value::as_array) {
        for (cell_id, cell) in items.iter().enumerate() {
            let Some(cell) = cell.as_object() else {
                return Err(ConvertError::source_read(source_id, format!("cell {cell_id} is not a json object")));
            };
            cells.add_cell(cell_id as i64, cell);
        }
    }

    let metadata = notebook.get("metadata").and_then(Value::as_object);
    let entries = |key: &str| -> Vec<Vec<Scalar>> {
        metadata
            .and_then(|m| m.get(key))
            .and_then(Value::as_object)
            .map(|m| m.iter().map(|(k, v)| vec![Scalar::text(k.as_str()), kv_value(v)]).collect())
            .unwrap_or_default()
    };
    let kernelspec = entries("kernelspec");
    let language_info = metadata
        .and_then(|m| m.get("language_info"))
        .and_then(Value::as_object)
        .map(language_info_rows)
        .unwrap_or_default();
    let metadata_kv = entries("anaconda-cloud");

    let versions: Vec<Vec<Scalar>> = ["nbformat", "nbformat_minor"]
        .iter()
        .filter_map(|k| notebook.get(*k).map(|v| vec![Scalar::text(*k), kv_value(v)]))
        .collect();

    let table = |label: &str, header: &[&str], rows: Vec<Vec<Scalar>>| {
        RawTable::new(source_id, label, header.iter().map(|h| h.to_string()).collect(), rows)
    };
    let tables = vec![
        table("cells_source", &["cell_id", "line_no", "text"], cells.source),
        table("cells_outputs", &["cell_id", "type", "line_no", "data"], cells.outputs),
        table("cells_outputs_kv", &["cell_id", "key", "value"], cells.outputs_kv),
        table("cells_kv", &["cell_id", "key", "value"], cells.kv),
        table("metadata_kernelspec", &["key", "value"], kernelspec),
        table("metadata_language_info", &["key", "value"], language_info),
        table("metadata_kv", &["key", "value"], metadata_kv),
        table("kv", &["key", "value"], versions),
    ];
    Ok(tables.into_iter().filter(|t| !t.rows.is_empty()).collect())
}

#[derive(Default)]
struct CellTables {
    source: Vec<Vec<Scalar>>,
    outputs: Vec<Vec<Scalar>>,
    outputs_kv: Vec<Vec<Scalar>>,
    kv: Vec<Vec<Scalar>>,
}

impl CellTables {
    fn add_cell(&mut self, cell_id: i64, cell: &Map<String, Value>) {
        if let Some(source) = cell.get("source") {
            for (line_no, line) in multiline_text(source).lines().enumerate() {
                self.source.push(vec![
                    Scalar::Integer(cell_id),
                    Scalar::Integer(line_no as i64),
                    Scalar::text(line.trim_end()),
                ]);
            }
        }

        if let Some(outputs) = cell.get("outputs").and_then(Value::as_array) {
            for output in outputs.iter().filter_map(Value::as_object) {
                self.add_output(cell_id, output);
            }
        }

        for (key, value) in cell {
            if key != "source" && key != "outputs" {
                self.kv.push(vec![Scalar::Integer(cell_id), Scalar::text(key.as_str()), kv_value(value)]);
            }
        }
    }

    fn add_output(&mut self, cell_id: i64, output: &Map<String, Value>) {
        if let Some(text) = output.get("text") {
            self.push_lines(cell_id, "text", &multiline_text(text));
        }

        if let Some(data) = output.get("data").and_then(Value::as_object) {
            for (mime, value) in data {
                if mime.starts_with("image/") {
                    self.outputs.push(vec![
                        Scalar::Integer(cell_id),
                        Scalar::text(mime.as_str()),
                        Scalar::Integer(0),
                        Scalar::Text(multiline_text(value)),
                    ]);
                    continue;
                }
                let text = match value {
                    Value::Object(_) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
                    other => multiline_text(other),
                };
                self.push_lines(cell_id, mime, &text);
            }
        }

        for (key, value) in output {
            if key != "text" && key != "data" {
                self.outputs_kv
                    .push(vec![Scalar::Integer(cell_id), Scalar::text(key.as_str()), kv_value(value)]);
            }
        }
    }

    fn push_lines(&mut self, cell_id: i64, kind: &str, text: &str) {
        for (line_no, line) in text.lines().enumerate() {
            self.outputs.push(vec![
                Scalar::Integer(cell_id),
                Scalar::text(kind),
                Scalar::Integer(line_no as i64),
                Scalar::text(line),
            ]);
        }
    }
}

fn language_info_rows(info: &Map<String, Value>) -> Vec<Vec<Scalar>> {
    let mut rows = Vec::new();
    if let Some(Value::Object(mode)) = info.get("codemirror_mode") {
        for (k, v) in mode {
            rows.push(vec![Scalar::Text(format!("codemirror_mode_{k}")), kv_value(v)]);
        }
    }
    for (k, v) in info {
        if k == "codemirror_mode" && v.is_object() {
            continue;
        }
        rows.push(vec![Scalar::text(k.as_str()), kv_value(v)]);
    }
    rows
}

/// nbformat stores multi-line strings either as one string or as a list of line strings.
fn multiline_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|p| p.as_str().map(str::to_string).unwrap_or_else(|| p.to_string()))
            .collect(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Key/value tables hold text; empty objects (e.g. cell `metadata: {}`) read as null.
fn kv_value(v: &Value) -> Scalar {
    match v {
        Value::Null => Scalar::Null,
        Value::String(s) => Scalar::Text(s.clone()),
        Value::Object(m) if m.is_empty() => Scalar::Null,
        other => Scalar::Text(other.to_string()),
    }
}
