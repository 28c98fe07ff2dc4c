//! Reader for existing SQLite databases: every user table becomes a raw table.

use std::fmt::Write as _;
use std::vec;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::error::ConvertResult;
use crate::schema::quote_identifier;
use crate::types::{RawTable, Scalar};

use super::unified::{SourceFormat, SourceHandle, SourceTables};

/// Open a SQLite file read-only and read its user tables lazily, in name order.
pub fn read_sqlite_source(handle: &SourceHandle) -> ConvertResult<SourceTables> {
    let conn = Connection::open_with_flags(
        &handle.path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    let names = user_tables(&conn)?;
    let multi_table = names.len() > 1;
    let tables = DatabaseTables {
        conn,
        names: names.into_iter(),
        source_id: handle.source_id(),
    };
    Ok(SourceTables::new(handle, SourceFormat::Sqlite, multi_table, tables))
}

fn user_tables(conn: &Connection) -> ConvertResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
    )?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

struct DatabaseTables {
    conn: Connection,
    names: vec::IntoIter<String>,
    source_id: String,
}

impl Iterator for DatabaseTables {
    type Item = ConvertResult<RawTable>;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.names.next()?;
        Some(read_table(&self.conn, &self.source_id, &name))
    }
}

fn read_table(conn: &Connection, source_id: &str, name: &str) -> ConvertResult<RawTable> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM {}", quote_identifier(name)))?;
    let header: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = header.len();

    let mut out = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            cells.push(value_to_scalar(row.get_ref(idx)?));
        }
        out.push(cells);
    }
    Ok(RawTable::new(source_id, name, header, out))
}

fn value_to_scalar(v: ValueRef<'_>) -> Scalar {
    match v {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::Integer(i),
        ValueRef::Real(f) => Scalar::Real(f),
        ValueRef::Text(bytes) => Scalar::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            let mut hex = String::with_capacity(bytes.len() * 2);
            for b in bytes {
                let _ = write!(hex, "{b:02x}");
            }
            Scalar::Text(hex)
        }
    }
}
