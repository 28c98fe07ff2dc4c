//! SQLite sink backed by `rusqlite`.

use std::path::Path;

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, ErrorCode};

use crate::error::{ConvertError, ConvertResult};
use crate::schema::{create_table_sql, quote_identifier};
use crate::types::{Scalar, SqlType, TableSchema};

use super::{CatalogColumn, DatabaseSink, TableCatalog, TableInfo};

const TABLE_SAVEPOINT: &str = "sqlite_ingest_table";

impl ToSql for Scalar {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Scalar::Null => ToSqlOutput::Owned(Value::Null),
            Scalar::Integer(v) => ToSqlOutput::Owned(Value::Integer(*v)),
            Scalar::Real(v) => ToSqlOutput::Owned(Value::Real(*v)),
            Scalar::Boolean(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            Scalar::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// A [`DatabaseSink`] writing into one SQLite database file.
#[derive(Debug)]
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(Self { conn })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> ConvertResult<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    /// Borrow the underlying connection (e.g. to query converted tables).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn table_exists(&self, name: &str) -> ConvertResult<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    fn table_columns(&self, table: &str) -> ConvertResult<Vec<CatalogColumn>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map([table], |row| {
            let declared_type: String = row.get(1)?;
            Ok(CatalogColumn {
                name: row.get(0)?,
                sql_type: SqlType::from_declared(&declared_type),
                declared_type,
                not_null: row.get::<_, i64>(2)? != 0,
                primary_key: row.get::<_, i64>(3)? != 0,
            })
        })?;
        let mut out = Vec::new();
        for col in rows {
            out.push(col?);
        }
        Ok(out)
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation)
}

impl DatabaseSink for SqliteSink {
    fn list_tables(&self) -> ConvertResult<TableCatalog> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut catalog = TableCatalog::new();
        for name in names {
            let columns = self.table_columns(&name)?;
            catalog.insert(TableInfo { name, columns });
        }
        Ok(catalog)
    }

    fn create_table(&mut self, schema: &TableSchema) -> ConvertResult<()> {
        if self.table_exists(&schema.table_name)? {
            return Err(ConvertError::Schema {
                table: schema.table_name.clone(),
                message: "table already exists".to_string(),
            });
        }
        let sql = create_table_sql(schema);
        tracing::debug!(table = %schema.table_name, %sql, "creating table");
        self.conn.execute_batch(&sql).map_err(|e| ConvertError::Schema {
            table: schema.table_name.clone(),
            message: e.to_string(),
        })
    }

    fn drop_table(&mut self, name: &str) -> ConvertResult<()> {
        tracing::debug!(table = name, "dropping table");
        self.conn
            .execute_batch(&format!("DROP TABLE {}", quote_identifier(name)))?;
        Ok(())
    }

    fn insert_rows(&mut self, table: &str, columns: &[String], rows: &[Vec<Scalar>]) -> ConvertResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let column_list: Vec<String> = columns.iter().map(|c| quote_identifier(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table),
            column_list.join(", "),
            placeholders.join(", ")
        );

        let mut stmt = self.conn.prepare_cached(&sql)?;
        for (offset, row) in rows.iter().enumerate() {
            if let Err(e) = stmt.execute(params_from_iter(row.iter())) {
                if is_constraint_violation(&e) {
                    return Err(ConvertError::Constraint {
                        table: table.to_string(),
                        row: offset,
                        message: e.to_string(),
                    });
                }
                return Err(e.into());
            }
        }
        Ok(rows.len())
    }

    fn begin_table(&mut self) -> ConvertResult<()> {
        self.conn.execute_batch(&format!("SAVEPOINT {TABLE_SAVEPOINT}"))?;
        Ok(())
    }

    fn commit_table(&mut self) -> ConvertResult<()> {
        self.conn.execute_batch(&format!("RELEASE {TABLE_SAVEPOINT}"))?;
        Ok(())
    }

    fn rollback_table(&mut self) -> ConvertResult<()> {
        self.conn.execute_batch(&format!(
            "ROLLBACK TO {TABLE_SAVEPOINT}; RELEASE {TABLE_SAVEPOINT}"
        ))?;
        Ok(())
    }
}
