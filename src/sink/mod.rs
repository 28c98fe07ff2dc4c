//! Database sink abstraction.
//!
//! The conversion run only talks to the destination database through [`DatabaseSink`]: list the
//! existing catalog, create/drop tables, insert rows, and bracket each table's write in a
//! transaction boundary. [`SqliteSink`] is the `rusqlite` implementation.

pub mod sqlite;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::ConvertResult;
use crate::types::{Scalar, SqlType, TableSchema};

pub use sqlite::SqliteSink;

/// A column as reported by the destination database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogColumn {
    /// Column name as declared.
    pub name: String,
    /// Declared type text (may be empty for untyped columns).
    pub declared_type: String,
    /// Storage type derived from the declared type with SQLite's affinity rules.
    pub sql_type: SqlType,
    /// `NOT NULL` constraint.
    pub not_null: bool,
    /// Part of the primary key.
    pub primary_key: bool,
}

/// One existing table and its columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    /// Table name as declared.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<CatalogColumn>,
}

impl TableInfo {
    /// Describe a table created from `schema`.
    pub fn from_schema(schema: &TableSchema) -> Self {
        let columns = schema
            .columns
            .iter()
            .map(|c| {
                let primary_key = schema.primary_key.as_deref() == Some(c.name.as_str());
                CatalogColumn {
                    name: c.name.clone(),
                    declared_type: c.sql_type.as_sql().to_string(),
                    sql_type: c.sql_type,
                    not_null: !c.nullable && !primary_key,
                    primary_key,
                }
            })
            .collect();
        Self {
            name: schema.table_name.clone(),
            columns,
        }
    }

    /// Returns `true` if a column with this name exists (case-insensitive).
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Snapshot of the destination database's tables, keyed case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableCatalog {
    tables: BTreeMap<String, TableInfo>,
}

impl TableCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from table descriptions.
    pub fn from_tables(tables: impl IntoIterator<Item = TableInfo>) -> Self {
        let mut catalog = Self::new();
        for t in tables {
            catalog.insert(t);
        }
        catalog
    }

    /// Returns `true` if the table exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_ascii_lowercase())
    }

    /// Look up a table.
    pub fn get(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(&name.to_ascii_lowercase())
    }

    /// Add or replace a table.
    pub fn insert(&mut self, table: TableInfo) {
        self.tables.insert(table.name.to_ascii_lowercase(), table);
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if the database has no user tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Storage operations the conversion run needs from the destination database.
///
/// There is exactly one writer per run, so implementations need no locking beyond their own
/// transaction boundaries.
pub trait DatabaseSink {
    /// Existing user tables with their column catalogs.
    fn list_tables(&self) -> ConvertResult<TableCatalog>;

    /// Create a table. Fails with [`crate::ConvertError::Schema`] if the name exists or the
    /// definition is rejected.
    fn create_table(&mut self, schema: &TableSchema) -> ConvertResult<()>;

    /// Drop a table.
    fn drop_table(&mut self, name: &str) -> ConvertResult<()>;

    /// Insert rows into `columns` of `table`, returning the number of rows written.
    ///
    /// A rejected row fails with [`crate::ConvertError::Constraint`] carrying its offset in
    /// `rows`. Rows before it stay written; the caller decides whether to continue.
    fn insert_rows(&mut self, table: &str, columns: &[String], rows: &[Vec<Scalar>]) -> ConvertResult<usize>;

    /// Open the transaction boundary for one table's write.
    fn begin_table(&mut self) -> ConvertResult<()> {
        Ok(())
    }

    /// Make the current table's write durable.
    fn commit_table(&mut self) -> ConvertResult<()> {
        Ok(())
    }

    /// Undo everything since [`DatabaseSink::begin_table`].
    fn rollback_table(&mut self) -> ConvertResult<()> {
        Ok(())
    }
}
