//! SQL identifier sanitization, de-duplication and quoting.
//!
//! Identifiers produced here only contain alphanumeric characters and `_`, never start with an
//! ASCII digit and are never empty, so [`sanitize_identifier`] is idempotent. They are still
//! always quoted with [`quote_identifier`] when embedded in SQL.

use std::collections::HashSet;

/// Sanitize a raw header or label into an identifier.
///
/// - trims surrounding whitespace
/// - replaces every character that is not alphanumeric or `_` with `_`
/// - prefixes `_` when the result starts with an ASCII digit
///
/// Returns an empty string when the trimmed input is empty; callers substitute a placeholder.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut out: String = raw
        .trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Sanitize a header cell, substituting `column_<index>` for empty headers.
pub fn column_identifier(raw: &str, index: usize) -> String {
    let name = sanitize_identifier(raw);
    if name.is_empty() {
        format!("column_{index}")
    } else {
        name
    }
}

/// Tracks identifiers already taken within one scope (a table's columns, a run's table names).
///
/// Comparison is ASCII case-insensitive because SQLite resolves identifiers that way.
#[derive(Debug, Clone, Default)]
pub struct IdentifierSet {
    taken: HashSet<String>,
}

impl IdentifierSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `name` (case-insensitively) is already taken.
    pub fn contains(&self, name: &str) -> bool {
        self.taken.contains(&name.to_ascii_lowercase())
    }

    /// Mark `name` as taken. Returns `false` if it already was.
    pub fn insert(&mut self, name: &str) -> bool {
        self.taken.insert(name.to_ascii_lowercase())
    }

    /// Claim `base` if free, otherwise the first free `base_<n>` with `n` counting up from 1.
    ///
    /// `is_blocked` lets callers reject additional names (e.g. tables already present in the
    /// destination database) without inserting them into the set.
    pub fn claim_with(&mut self, base: &str, mut is_blocked: impl FnMut(&str) -> bool) -> String {
        if !self.contains(base) && !is_blocked(base) {
            self.insert(base);
            return base.to_string();
        }
        let mut n = 1usize;
        loop {
            let candidate = format!("{base}_{n}");
            if !self.contains(&candidate) && !is_blocked(&candidate) {
                self.insert(&candidate);
                return candidate;
            }
            n += 1;
        }
    }

    /// Claim `base` or the first free suffixed variant.
    pub fn claim(&mut self, base: &str) -> String {
        self.claim_with(base, |_| false)
    }
}

/// Sanitize every header cell and resolve duplicates in header order.
///
/// The output has the same length and order as `header`.
pub fn dedupe_columns<S: AsRef<str>>(header: &[S]) -> Vec<String> {
    let mut taken = IdentifierSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, raw)| taken.claim(&column_identifier(raw.as_ref(), idx)))
        .collect()
}

/// Quote an identifier for SQLite: wrap in double quotes and double embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
