//! Write policy: decide what to do with each target table.
//!
//! | mode        | table missing | table exists                                         |
//! |-------------|---------------|------------------------------------------------------|
//! | `create`    | create        | skip (`table_exists`)                                |
//! | `overwrite` | create        | overwrite (drop + create)                            |
//! | `append`    | create        | append if existing columns ⊇ new columns, else skip (`schema_mismatch`) |
//!
//! An abort request always resolves to skip (`aborted`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sink::TableCatalog;
use crate::types::TableSchema;

/// Configured behavior for tables that already exist in the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Only create new tables; existing ones are left alone.
    #[default]
    Create,
    /// Drop and recreate existing tables.
    Overwrite,
    /// Append rows to compatible existing tables.
    Append,
}

impl WriteMode {
    /// Whether this mode may write into a table that already exists.
    pub fn reuses_existing(&self) -> bool {
        matches!(self, Self::Overwrite | Self::Append)
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Overwrite => "overwrite",
            Self::Append => "append",
        })
    }
}

/// Resolved action for one target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteAction {
    Create,
    Overwrite,
    Append,
    Skip,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Overwrite => "overwrite",
            Self::Append => "append",
            Self::Skip => "skip",
        })
    }
}

/// Why a [`WriteAction`] was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    NewTable,
    ReplacedExisting,
    CompatibleSchema,
    TableExists,
    SchemaMismatch,
    Aborted,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NewTable => "new_table",
            Self::ReplacedExisting => "replaced_existing",
            Self::CompatibleSchema => "compatible_schema",
            Self::TableExists => "table_exists",
            Self::SchemaMismatch => "schema_mismatch",
            Self::Aborted => "aborted",
        })
    }
}

/// Action and reason for one target table in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteDecision {
    pub table_name: String,
    pub action: WriteAction,
    pub reason: DecisionReason,
}

impl WriteDecision {
    fn new(table_name: &str, action: WriteAction, reason: DecisionReason) -> Self {
        Self {
            table_name: table_name.to_string(),
            action,
            reason,
        }
    }

    /// Skip decision recorded for a table that was never written because the run was aborted.
    pub fn aborted(table_name: &str) -> Self {
        Self::new(table_name, WriteAction::Skip, DecisionReason::Aborted)
    }

    /// Returns `true` unless the decision is a skip.
    pub fn writes(&self) -> bool {
        self.action != WriteAction::Skip
    }
}

/// Decide the write action for `schema` against the destination `catalog`.
pub fn decide(schema: &TableSchema, catalog: &TableCatalog, mode: WriteMode, aborted: bool) -> WriteDecision {
    let name = schema.table_name.as_str();
    if aborted {
        return WriteDecision::aborted(name);
    }

    let Some(existing) = catalog.get(name) else {
        return WriteDecision::new(name, WriteAction::Create, DecisionReason::NewTable);
    };

    match mode {
        WriteMode::Create => WriteDecision::new(name, WriteAction::Skip, DecisionReason::TableExists),
        WriteMode::Overwrite => {
            WriteDecision::new(name, WriteAction::Overwrite, DecisionReason::ReplacedExisting)
        }
        WriteMode::Append => {
            if schema.column_names().all(|c| existing.has_column(c)) {
                WriteDecision::new(name, WriteAction::Append, DecisionReason::CompatibleSchema)
            } else {
                WriteDecision::new(name, WriteAction::Skip, DecisionReason::SchemaMismatch)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{decide, DecisionReason, WriteAction, WriteMode};
    use crate::sink::{TableCatalog, TableInfo};
    use crate::types::{ColumnDef, InferredType, TableSchema};

    fn schema(name: &str, cols: &[(&str, InferredType)]) -> TableSchema {
        TableSchema::new(
            name,
            cols.iter().map(|(n, t)| ColumnDef::new(*n, *t, true)).collect(),
            None,
        )
    }

    fn catalog_with_t() -> TableCatalog {
        TableCatalog::from_tables([TableInfo::from_schema(&schema(
            "t",
            &[("a", InferredType::Integer), ("b", InferredType::Text)],
        ))])
    }

    #[test]
    fn missing_table_is_created_in_every_mode() {
        let s = schema("new", &[("a", InferredType::Integer)]);
        for mode in [WriteMode::Create, WriteMode::Overwrite, WriteMode::Append] {
            let d = decide(&s, &catalog_with_t(), mode, false);
            assert_eq!(d.action, WriteAction::Create);
            assert_eq!(d.reason, DecisionReason::NewTable);
        }
    }

    #[test]
    fn create_mode_skips_existing_table() {
        let s = schema("T", &[("a", InferredType::Integer)]);
        let d = decide(&s, &catalog_with_t(), WriteMode::Create, false);
        assert_eq!((d.action, d.reason), (WriteAction::Skip, DecisionReason::TableExists));
    }

    #[test]
    fn overwrite_mode_replaces_existing_table() {
        let s = schema("t", &[("z", InferredType::Real)]);
        let d = decide(&s, &catalog_with_t(), WriteMode::Overwrite, false);
        assert_eq!((d.action, d.reason), (WriteAction::Overwrite, DecisionReason::ReplacedExisting));
    }

    #[test]
    fn append_requires_existing_columns_to_cover_new_ones() {
        let subset = schema("t", &[("A", InferredType::Integer)]);
        let d = decide(&subset, &catalog_with_t(), WriteMode::Append, false);
        assert_eq!((d.action, d.reason), (WriteAction::Append, DecisionReason::CompatibleSchema));

        let wider = schema(
            "t",
            &[("a", InferredType::Integer), ("b", InferredType::Text), ("c", InferredType::Text)],
        );
        let d = decide(&wider, &catalog_with_t(), WriteMode::Append, false);
        assert_eq!((d.action, d.reason), (WriteAction::Skip, DecisionReason::SchemaMismatch));
    }

    #[test]
    fn abort_wins_over_everything() {
        let s = schema("new", &[("a", InferredType::Integer)]);
        let d = decide(&s, &TableCatalog::new(), WriteMode::Overwrite, true);
        assert_eq!((d.action, d.reason), (WriteAction::Skip, DecisionReason::Aborted));
        assert!(!d.writes());
    }
}
