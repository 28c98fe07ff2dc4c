//! Delimited text (CSV/TSV) reader.

use std::io::Read;
use std::path::Path;

use crate::error::{ConvertError, ConvertResult};
use crate::types::{PendingRows, RawTable, Scalar};

use super::unified::{SourceFormat, SourceHandle, SourceTables};

/// Read a delimited file as a single-table source.
///
/// A file without a header row yields no tables.
pub fn read_csv_source(
    handle: &SourceHandle,
    format: SourceFormat,
    delimiter: u8,
    max_buffer_rows: Option<usize>,
) -> ConvertResult<SourceTables> {
    let table = read_csv_from_path(&handle.path, &handle.source_id(), &handle.stem(), delimiter, max_buffer_rows)?;
    let tables = if table.header.is_empty() {
        vec![]
    } else {
        vec![table]
    };
    Ok(SourceTables::from_tables(handle, format, tables))
}

/// Read a delimited file into a [`RawTable`].
///
/// Rules:
///
/// - the first record is the header
/// - records may have any length; rows that don't match the header width are kept as-is so the
///   conversion run can count and drop them
/// - every cell is [`Scalar::Text`], untrimmed
/// - at most `max_buffer_rows` rows are read up front; the file stays open for the rest
pub fn read_csv_from_path(
    path: impl AsRef<Path>,
    source_id: &str,
    label: &str,
    delimiter: u8,
    max_buffer_rows: Option<usize>,
) -> ConvertResult<RawTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)?;
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut records = rdr
        .into_records()
        .map(|r| {
            r.map(|record| record.iter().map(Scalar::text).collect::<Vec<Scalar>>())
                .map_err(ConvertError::from)
        })
        .peekable();
    let rows = records
        .by_ref()
        .take(max_buffer_rows.unwrap_or(usize::MAX))
        .collect::<ConvertResult<Vec<Vec<Scalar>>>>()?;

    let table = RawTable::new(source_id, label, header, rows);
    if records.peek().is_some() {
        return Ok(table.with_pending(PendingRows::new(records)));
    }
    Ok(table)
}

/// Read delimited data from an existing CSV reader.
pub fn read_csv_from_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
    source_id: &str,
    label: &str,
) -> ConvertResult<RawTable> {
    let header: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

    let mut rows: Vec<Vec<Scalar>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(Scalar::text).collect());
    }

    Ok(RawTable::new(source_id, label, header, rows))
}

#[cfg(test)]
mod tests {
    use super::read_csv_from_reader;
    use crate::types::Scalar;

    fn reader(input: &str) -> csv::Reader<&[u8]> {
        csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input.as_bytes())
    }

    #[test]
    fn short_and_long_rows_are_preserved() {
        let t = read_csv_from_reader(&mut reader("a,b\n1,2\n3\n4,5,6\n"), "mem", "t").unwrap();
        assert_eq!(t.header, ["a", "b"]);
        let widths: Vec<usize> = t.rows.iter().map(Vec::len).collect();
        assert_eq!(widths, [2, 1, 3]);
    }

    #[test]
    fn cells_are_text_and_quoted_fields_unwrap() {
        let t = read_csv_from_reader(&mut reader("name,note\n\"Smith, J\", x \n"), "mem", "t").unwrap();
        assert_eq!(t.rows[0], vec![Scalar::text("Smith, J"), Scalar::text(" x ")]);
    }
}
