//! Schema synthesis: column profiles in, [`TableSchema`] out.
//!
//! - header cells become sanitized, de-duplicated identifiers ([`identifier`])
//! - semantic types map onto SQLite storage types (`boolean` is stored as `INTEGER` 0/1)
//! - an `id`-like integer column with no duplicate values becomes the primary key
//!
//! ```rust
//! use sqlite_ingest::inference::{infer_profiles, InferenceOptions};
//! use sqlite_ingest::schema::{synthesize_schema, SchemaOptions};
//! use sqlite_ingest::types::{RawTable, Scalar, SqlType};
//!
//! let table = RawTable::new(
//!     "people.csv",
//!     "people",
//!     vec!["id".into(), "Name".into(), "Name".into()],
//!     vec![
//!         vec![Scalar::Integer(1), Scalar::text("a"), Scalar::text("b")],
//!         vec![Scalar::Integer(2), Scalar::text("c"), Scalar::text("d")],
//!     ],
//! );
//! let profiles = infer_profiles(&table, &InferenceOptions::default());
//! let schema = synthesize_schema("people", &profiles, &SchemaOptions::default());
//!
//! let names: Vec<&str> = schema.column_names().collect();
//! assert_eq!(names, ["id", "Name", "Name_1"]);
//! assert_eq!(schema.columns[0].sql_type, SqlType::Integer);
//! assert_eq!(schema.primary_key.as_deref(), Some("id"));
//! ```

pub mod identifier;

use regex::Regex;

use crate::error::ConvertResult;
use crate::types::{ColumnDef, ColumnProfile, InferredType, TableSchema};

pub use identifier::{column_identifier, dedupe_columns, quote_identifier, sanitize_identifier, IdentifierSet};

/// Default pattern for primary-key candidates: a column named exactly `id`, any case.
pub const DEFAULT_ID_PATTERN: &str = "(?i)^id$";

/// Options for [`synthesize_schema`].
#[derive(Debug, Clone)]
pub struct SchemaOptions {
    /// Columns whose sanitized name matches become primary-key candidates. `None` disables
    /// primary-key selection.
    pub id_pattern: Option<Regex>,
}

impl SchemaOptions {
    /// Build options from an optional pattern string.
    pub fn with_id_pattern(pattern: Option<&str>) -> ConvertResult<Self> {
        let id_pattern = pattern.map(Regex::new).transpose()?;
        Ok(Self { id_pattern })
    }
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            id_pattern: Regex::new(DEFAULT_ID_PATTERN).ok(),
        }
    }
}

/// Convert column profiles into a [`TableSchema`] named `table_name`.
///
/// Output columns are in profile (header) order. The primary key is the first column that:
///
/// - matches [`SchemaOptions::id_pattern`]
/// - is inferred `integer`, non-nullable, with no duplicate values
/// - was inferred from a full scan (a sample cannot prove uniqueness)
pub fn synthesize_schema(
    table_name: &str,
    profiles: &[ColumnProfile],
    options: &SchemaOptions,
) -> TableSchema {
    let names = dedupe_columns(&profiles.iter().map(|p| p.name.as_str()).collect::<Vec<_>>());

    let columns: Vec<ColumnDef> = names
        .into_iter()
        .zip(profiles)
        .map(|(name, profile)| ColumnDef::new(name, frozen_type(profile), profile.nullable))
        .collect();

    let primary_key = options.id_pattern.as_ref().and_then(|pattern| {
        columns
            .iter()
            .zip(profiles)
            .find(|(col, profile)| pattern.is_match(&col.name) && is_key_candidate(profile))
            .map(|(col, _)| col.name.clone())
    });

    TableSchema::new(table_name, columns, primary_key)
}

fn frozen_type(profile: &ColumnProfile) -> InferredType {
    if profile.type_conflict {
        return InferredType::Text;
    }
    match profile.inferred_type {
        InferredType::Null => InferredType::Text,
        other => other,
    }
}

fn is_key_candidate(profile: &ColumnProfile) -> bool {
    profile.inferred_type == InferredType::Integer
        && profile.unique
        && !profile.nullable
        && !profile.sampled
        && profile.sample_count > 0
}

/// Render the `CREATE TABLE` statement for a schema.
///
/// Non-nullable columns are declared `NOT NULL`; the primary key column is declared
/// `INTEGER PRIMARY KEY` inline so it aliases SQLite's rowid.
pub fn create_table_sql(schema: &TableSchema) -> String {
    let defs: Vec<String> = schema
        .columns
        .iter()
        .map(|col| {
            let mut def = format!("{} {}", quote_identifier(&col.name), col.sql_type.as_sql());
            if schema.primary_key.as_deref() == Some(col.name.as_str()) {
                def.push_str(" PRIMARY KEY");
            } else if !col.nullable {
                def.push_str(" NOT NULL");
            }
            def
        })
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        quote_identifier(&schema.table_name),
        defs.join(", ")
    )
}
