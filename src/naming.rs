//! Table name resolution for one conversion run.
//!
//! [`NameRegistry`] is the run-scoped context holding every table name claimed so far. It is
//! created at the start of a run, passed explicitly to each resolution, and dropped with the
//! run.
//!
//! Candidate names:
//!
//! - single-table source: the sanitized table label
//! - multi-table source: `<source stem>_<label>`
//! - with a template: the template rendered with `{source}`, `{label}` and `{index}`
//!
//! A candidate that collides with a name claimed earlier in the run, or with a table in the
//! destination database (unless the caller may reuse existing tables), gets `_<n>` appended
//! until unique.

use crate::schema::{sanitize_identifier, IdentifierSet};
use crate::sink::TableCatalog;

/// Placeholder used when a label sanitizes to nothing.
const EMPTY_TABLE_NAME: &str = "table";

/// What the resolver needs to know about one raw table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingRequest<'a> {
    /// Source stem (file name without extension).
    pub source_stem: &'a str,
    /// Table label within the source.
    pub table_label: &'a str,
    /// 0-based position of the table within its source.
    pub table_index: usize,
    /// Whether the source yields more than one table.
    pub multi_table: bool,
}

/// Names claimed during one conversion run.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    claimed: IdentifierSet,
    template: Option<String>,
}

impl NameRegistry {
    /// Create a registry for a new run, optionally with a table name template.
    pub fn new(template: Option<String>) -> Self {
        Self {
            claimed: IdentifierSet::new(),
            template,
        }
    }

    /// Claim a name up front (e.g. a bookkeeping table) so no converted table can take it.
    pub fn reserve(&mut self, name: &str) {
        self.claimed.insert(name);
    }

    /// Sanitized candidate name before collision handling.
    pub fn candidate(&self, req: &NamingRequest<'_>) -> String {
        let raw = match &self.template {
            Some(template) => template
                .replace("{source}", &sanitize_identifier(req.source_stem))
                .replace("{label}", &sanitize_identifier(req.table_label))
                .replace("{index}", &req.table_index.to_string()),
            None if req.multi_table => {
                format!(
                    "{}_{}",
                    sanitize_identifier(req.source_stem),
                    sanitize_identifier(req.table_label)
                )
            }
            None => req.table_label.to_string(),
        };

        let mut name = sanitize_identifier(&raw);
        if name.is_empty() || name.chars().all(|c| c == '_') {
            name = EMPTY_TABLE_NAME.to_string();
        }
        // SQLite reserves the `sqlite_` prefix for internal tables.
        if name.to_ascii_lowercase().starts_with("sqlite_") {
            name.insert(0, '_');
        }
        name
    }

    /// Resolve and claim a unique table name.
    ///
    /// With `reuse_existing`, a name present in `catalog` is acceptable (the write policy will
    /// overwrite or append); otherwise existing tables count as collisions.
    pub fn resolve(&mut self, req: &NamingRequest<'_>, catalog: &TableCatalog, reuse_existing: bool) -> String {
        let base = self.candidate(req);
        let name = self
            .claimed
            .claim_with(&base, |n| !reuse_existing && catalog.contains(n));
        if name != base {
            tracing::debug!(candidate = %base, resolved = %name, "table name collision resolved");
        }
        name
    }
}
