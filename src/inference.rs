//! Column type inference.
//!
//! [`infer_profiles`] scans a [`RawTable`] column by column and derives one [`ColumnProfile`]
//! per header position. Each non-empty cell is classified with a strict-then-permissive
//! cascade (integer, real, boolean literal, text) and the column takes the most general type
//! needed by any of its values (`integer < real < text`). Booleans only win when every
//! non-empty value is a boolean.
//!
//! By default every buffered row is scanned. Setting [`InferenceOptions::max_sample_rows`]
//! bounds the scan to a prefix of the table; the resulting profiles are marked `sampled` so
//! reports can flag the reduced confidence. A table with rows still pending past its buffer
//! is sampled too.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{ColumnProfile, InferredType, RawTable, Scalar};

/// Options controlling how much of a table inference looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceOptions {
    /// Scan at most this many (well-formed) rows. `None` scans every row.
    pub max_sample_rows: Option<usize>,
}

impl InferenceOptions {
    /// Full-scan inference.
    pub fn full_scan() -> Self {
        Self { max_sample_rows: None }
    }

    /// Sampled inference over the first `rows` rows.
    pub fn sampled(rows: usize) -> Self {
        Self {
            max_sample_rows: Some(rows),
        }
    }
}

/// Classification of a single non-empty cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellClass {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text,
}

/// Classify one cell. Returns `None` for empty cells (null or whitespace-only text).
pub fn classify(cell: &Scalar) -> Option<CellClass> {
    match cell {
        Scalar::Null => None,
        Scalar::Integer(v) => Some(CellClass::Integer(*v)),
        Scalar::Real(v) => Some(classify_real(*v)),
        Scalar::Boolean(b) => Some(CellClass::Boolean(*b)),
        Scalar::Text(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            if let Some(v) = parse_strict_i64(trimmed) {
                return Some(CellClass::Integer(v));
            }
            // Integers past 64 bits would round as REAL; keep every digit.
            if is_integer_literal(trimmed) {
                return Some(CellClass::Text);
            }
            if let Some(v) = parse_strict_f64(trimmed) {
                return Some(CellClass::Real(v));
            }
            if let Some(b) = parse_bool_literal(trimmed) {
                return Some(CellClass::Boolean(b));
            }
            Some(CellClass::Text)
        }
    }
}

// Spreadsheet readers report every number as a float.
fn classify_real(v: f64) -> CellClass {
    if !v.is_finite() {
        return CellClass::Text;
    }
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        CellClass::Integer(v as i64)
    } else {
        CellClass::Real(v)
    }
}

/// Optional sign followed by digits only.
fn is_integer_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an integer without accepting leading zeros (`"007"` stays text so codes keep their
/// digits). A leading `+` is accepted.
pub(crate) fn parse_strict_i64(s: &str) -> Option<i64> {
    if !is_integer_literal(s) {
        return None;
    }
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    s.parse::<i64>().ok()
}

/// Parse a finite float. Rejects `inf`/`nan` spellings that `f64::from_str` would accept, and
/// zero-padded values like `"007.5"`.
pub(crate) fn parse_strict_f64(s: &str) -> Option<f64> {
    if !s.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let unsigned = s.strip_prefix(['-', '+']).unwrap_or(s).as_bytes();
    if unsigned.len() > 1 && unsigned[0] == b'0' && unsigned[1].is_ascii_digit() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// The fixed boolean vocabulary: `true` / `false`, case-insensitive.
pub(crate) fn parse_bool_literal(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug, Default)]
struct ColumnAccumulator {
    saw_integer: bool,
    saw_real: bool,
    saw_boolean: bool,
    saw_text: bool,
    nullable: bool,
    count: usize,
    seen: HashSet<i64>,
    duplicate: bool,
}

impl ColumnAccumulator {
    fn observe(&mut self, cell: &Scalar) {
        let Some(class) = classify(cell) else {
            self.nullable = true;
            return;
        };
        self.count += 1;

        match class {
            CellClass::Integer(v) => {
                self.saw_integer = true;
                if self.integer_only() && !self.duplicate && !self.seen.insert(v) {
                    self.duplicate = true;
                    self.seen.clear();
                }
            }
            CellClass::Real(_) => self.saw_real = true,
            CellClass::Boolean(_) => self.saw_boolean = true,
            CellClass::Text => self.saw_text = true,
        }

        if !self.integer_only() && !self.seen.is_empty() {
            self.seen = HashSet::new();
        }
    }

    fn integer_only(&self) -> bool {
        !(self.saw_real || self.saw_boolean || self.saw_text)
    }

    fn freeze(self, name: &str, sampled: bool) -> ColumnProfile {
        let numeric = self.saw_integer || self.saw_real;
        let type_conflict = numeric && (self.saw_text || self.saw_boolean);

        let inferred_type = if self.count == 0 {
            InferredType::Text
        } else if self.saw_text || type_conflict {
            InferredType::Text
        } else if self.saw_boolean {
            InferredType::Boolean
        } else if self.saw_real {
            InferredType::Real
        } else {
            InferredType::Integer
        };

        ColumnProfile {
            name: name.to_string(),
            inferred_type,
            // Unscanned rows may hold empties.
            nullable: self.nullable || self.count == 0 || sampled,
            sample_count: self.count,
            type_conflict,
            unique: inferred_type == InferredType::Integer && !self.duplicate,
            sampled,
        }
    }
}

/// Derive one [`ColumnProfile`] per header column.
///
/// Rows whose length differs from the header are ignored (the conversion run drops them before
/// inference anyway). Inference never fails: anything ambiguous degrades to
/// [`InferredType::Text`].
pub fn infer_profiles(table: &RawTable, options: &InferenceOptions) -> Vec<ColumnProfile> {
    let width = table.header.len();
    let mut columns: Vec<ColumnAccumulator> = (0..width).map(|_| ColumnAccumulator::default()).collect();

    let limit = options.max_sample_rows.unwrap_or(usize::MAX);
    let mut well_formed = table.rows.iter().filter(|row| row.len() == width);
    let mut scanned = 0usize;
    for row in well_formed.by_ref().take(limit) {
        scanned += 1;
        for (acc, cell) in columns.iter_mut().zip(row.iter()) {
            acc.observe(cell);
        }
    }
    let sampled = well_formed.next().is_some() || table.has_pending_rows();

    tracing::trace!(
        table = %table.table_label,
        columns = width,
        rows_scanned = scanned,
        sampled,
        "inferred column profiles"
    );

    columns
        .into_iter()
        .zip(table.header.iter())
        .map(|(acc, name)| acc.freeze(name, sampled))
        .collect()
}
