//! Cell conversion to a column's declared type before insert.

use crate::inference::{classify, parse_bool_literal, CellClass};
use crate::types::{ColumnDef, InferredType, Scalar};

/// Convert one row in place. The row must have one cell per column.
pub(crate) fn coerce_row(row: Vec<Scalar>, columns: &[ColumnDef]) -> Vec<Scalar> {
    row.into_iter()
        .zip(columns)
        .map(|(cell, col)| coerce_cell(cell, col.semantic_type))
        .collect()
}

/// Convert a cell to the storage form of `target`.
///
/// - empty cells become `NULL`
/// - values that cannot be represented keep their original form (SQLite's column affinity
///   stores them as-is)
pub(crate) fn coerce_cell(cell: Scalar, target: InferredType) -> Scalar {
    if cell.is_empty() {
        return Scalar::Null;
    }

    match target {
        InferredType::Integer => match classify(&cell) {
            Some(CellClass::Integer(v)) => Scalar::Integer(v),
            _ => cell,
        },
        InferredType::Real => match classify(&cell) {
            Some(CellClass::Integer(v)) => Scalar::Real(v as f64),
            Some(CellClass::Real(v)) => Scalar::Real(v),
            _ => cell,
        },
        InferredType::Boolean => match &cell {
            Scalar::Text(s) => parse_bool_literal(s.trim()).map(Scalar::Boolean).unwrap_or(cell),
            _ => cell,
        },
        InferredType::Text | InferredType::Null => match cell {
            Scalar::Text(_) => cell,
            other => Scalar::Text(other.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::coerce_cell;
    use crate::types::{InferredType, Scalar};

    #[test]
    fn numeric_text_becomes_numbers() {
        assert_eq!(coerce_cell(Scalar::text(" 42 "), InferredType::Integer), Scalar::Integer(42));
        assert_eq!(coerce_cell(Scalar::text("3"), InferredType::Real), Scalar::Real(3.0));
        assert_eq!(coerce_cell(Scalar::Real(2.0), InferredType::Integer), Scalar::Integer(2));
    }

    #[test]
    fn empties_become_null() {
        assert_eq!(coerce_cell(Scalar::text("  "), InferredType::Text), Scalar::Null);
        assert_eq!(coerce_cell(Scalar::Null, InferredType::Integer), Scalar::Null);
    }

    #[test]
    fn text_columns_store_display_form() {
        assert_eq!(coerce_cell(Scalar::Real(2.5), InferredType::Text), Scalar::text("2.5"));
        assert_eq!(coerce_cell(Scalar::Boolean(true), InferredType::Text), Scalar::text("true"));
        assert_eq!(coerce_cell(Scalar::text(" x "), InferredType::Text), Scalar::text(" x "));
    }

    #[test]
    fn boolean_literals_are_parsed() {
        assert_eq!(coerce_cell(Scalar::text("TRUE"), InferredType::Boolean), Scalar::Boolean(true));
        assert_eq!(coerce_cell(Scalar::Boolean(false), InferredType::Boolean), Scalar::Boolean(false));
    }

    #[test]
    fn unrepresentable_values_are_kept() {
        assert_eq!(coerce_cell(Scalar::text("n/a"), InferredType::Integer), Scalar::text("n/a"));
    }
}
