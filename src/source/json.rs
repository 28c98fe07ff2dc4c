//! JSON reader.
//!
//! Supported inputs:
//! - An array of objects: `[{"a":1}, {"a":2}]` (one table)
//! - An object whose every value is an array of objects: `{"users":[...], "orders":[...]}`
//!   (one table per key, in document order)
//! - A single object: `{"a":1}` (one-row table)
//! - Newline-delimited JSON (NDJSON): `{"a":1}\n{"a":2}\n` (one table)
//!
//! The header is the union of object keys in first-seen order; missing keys read as null.
//! Nested arrays and objects are kept as their JSON text.

use std::fs;

use serde_json::{Map, Value};

use crate::error::{ConvertError, ConvertResult};
use crate::types::{RawTable, Scalar};

use super::unified::{SourceFormat, SourceHandle, SourceTables};

/// Read a JSON file as a source.
pub fn read_json_source(handle: &SourceHandle) -> ConvertResult<SourceTables> {
    let text = fs::read_to_string(&handle.path)?;
    let tables = read_json_tables(&text, &handle.source_id(), &handle.stem())?;
    Ok(SourceTables::from_tables(handle, SourceFormat::Json, tables))
}

/// Parse JSON text into raw tables. `label` names the table of a single-table document.
pub fn read_json_tables(input: &str, source_id: &str, label: &str) -> ConvertResult<Vec<RawTable>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ConvertError::source_read(source_id, "json input is empty"));
    }

    // First try parsing as a single JSON value (array or object).
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return match v {
            Value::Array(items) => Ok(vec![objects_to_table(&items, source_id, label)?]),
            Value::Object(map) => {
                if is_keyed_tables(&map) {
                    map.iter()
                        .map(|(key, items)| {
                            let items = items.as_array().map(Vec::as_slice).unwrap_or_default();
                            objects_to_table(items, source_id, key)
                        })
                        .collect()
                } else {
                    Ok(vec![objects_to_table(&[Value::Object(map)], source_id, label)?])
                }
            }
            _ => Err(ConvertError::source_read(
                source_id,
                "json must be an object, an array of objects, or NDJSON",
            )),
        };
    }

    // Fall back to NDJSON.
    let mut values = Vec::new();
    for (i, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let v = serde_json::from_str::<Value>(line)
            .map_err(|e| ConvertError::source_read(source_id, format!("invalid ndjson at line {}: {e}", i + 1)))?;
        values.push(v);
    }
    Ok(vec![objects_to_table(&values, source_id, label)?])
}

fn is_keyed_tables(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && map.values().all(|v| {
            v.as_array()
                .is_some_and(|items| !items.is_empty() && items.iter().all(Value::is_object))
        })
}

fn objects_to_table(values: &[Value], source_id: &str, label: &str) -> ConvertResult<RawTable> {
    let mut objects: Vec<&Map<String, Value>> = Vec::with_capacity(values.len());
    for (idx0, v) in values.iter().enumerate() {
        let obj = v.as_object().ok_or_else(|| {
            ConvertError::source_read(source_id, format!("table '{label}' row {} is not a json object", idx0 + 1))
        })?;
        objects.push(obj);
    }

    let mut header: Vec<String> = Vec::new();
    for obj in &objects {
        for key in obj.keys() {
            if !header.contains(key) {
                header.push(key.clone());
            }
        }
    }

    let rows = objects
        .iter()
        .map(|obj| {
            header
                .iter()
                .map(|k| obj.get(k).map(json_to_scalar).unwrap_or(Scalar::Null))
                .collect()
        })
        .collect();

    Ok(RawTable::new(source_id, label, header, rows))
}

fn json_to_scalar(v: &Value) -> Scalar {
    match v {
        Value::Null => Scalar::Null,
        Value::Bool(b) => Scalar::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Scalar::Integer(i)
            } else if n.is_u64() {
                // Out of i64 range; keep the digits rather than lose precision.
                Scalar::Text(n.to_string())
            } else {
                n.as_f64().map(Scalar::Real).unwrap_or_else(|| Scalar::Text(n.to_string()))
            }
        }
        Value::String(s) => Scalar::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => Scalar::Text(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::read_json_tables;
    use crate::types::Scalar;
    use crate::ConvertError;

    #[test]
    fn array_of_objects_unions_keys_in_first_seen_order() {
        let t = read_json_tables(r#"[{"a":1,"b":"x"},{"c":true,"a":2.5}]"#, "mem", "data").unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].table_label, "data");
        assert_eq!(t[0].header, ["a", "b", "c"]);
        assert_eq!(t[0].rows[0], vec![Scalar::Integer(1), Scalar::text("x"), Scalar::Null]);
        assert_eq!(t[0].rows[1], vec![Scalar::Real(2.5), Scalar::Null, Scalar::Boolean(true)]);
    }

    #[test]
    fn keyed_object_of_arrays_yields_one_table_per_key() {
        let t = read_json_tables(r#"{"users":[{"id":1}],"orders":[{"id":7,"qty":2}]}"#, "mem", "doc").unwrap();
        let labels: Vec<&str> = t.iter().map(|t| t.table_label.as_str()).collect();
        assert_eq!(labels, ["users", "orders"]);
        assert_eq!(t[1].header, ["id", "qty"]);
    }

    #[test]
    fn single_object_is_one_row_and_nested_values_are_json_text() {
        let t = read_json_tables(r#"{"a":1,"tags":["x","y"],"n":{"k":null}}"#, "mem", "doc").unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t[0].rows.len(), 1);
        assert_eq!(t[0].rows[0][1], Scalar::text(r#"["x","y"]"#));
        assert_eq!(t[0].rows[0][2], Scalar::text(r#"{"k":null}"#));
    }

    #[test]
    fn ndjson_fallback() {
        let t = read_json_tables("{\"a\":1}\n\n{\"a\":2}\n", "mem", "lines").unwrap();
        assert_eq!(t[0].rows.len(), 2);
    }

    #[test]
    fn scalars_in_array_are_rejected() {
        let err = read_json_tables("[1,2,3]", "mem", "x").unwrap_err();
        assert!(matches!(err, ConvertError::SourceRead { .. }));
    }

    #[test]
    fn huge_unsigned_numbers_keep_their_digits() {
        let t = read_json_tables(r#"[{"n":18446744073709551615}]"#, "mem", "x").unwrap();
        assert_eq!(t[0].rows[0][0], Scalar::text("18446744073709551615"));
    }
}
