//! Parquet reader.

use std::path::Path;

use parquet::file::reader::{ChunkReader, FileReader};
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::Field;

use crate::error::{ConvertError, ConvertResult};
use crate::types::{PendingRows, RawTable, Scalar};

use super::unified::{SourceFormat, SourceHandle, SourceTables};

/// Read a Parquet file as a single-table source.
pub fn read_parquet_source(handle: &SourceHandle, max_buffer_rows: Option<usize>) -> ConvertResult<SourceTables> {
    let table = read_parquet_from_path(&handle.path, &handle.source_id(), &handle.stem(), max_buffer_rows)?;
    Ok(SourceTables::from_tables(handle, SourceFormat::Parquet, vec![table]))
}

/// Read a Parquet file into a [`RawTable`].
///
/// Notes:
/// - the header is the top-level schema fields; nested groups become one column
/// - uses the Parquet record API (`RowIter`); rows past `max_buffer_rows` are left pending
pub fn read_parquet_from_path(
    path: impl AsRef<Path>,
    source_id: &str,
    label: &str,
    max_buffer_rows: Option<usize>,
) -> ConvertResult<RawTable> {
    let reader = SerializedFileReader::try_from(path.as_ref())?;
    let header = top_level_field_names(&reader);

    let mut rows_iter = reader
        .into_iter()
        .map(|row_res| {
            row_res
                .map(|row| row.get_column_iter().map(|(_, f)| field_to_scalar(f)).collect::<Vec<Scalar>>())
                .map_err(ConvertError::from)
        })
        .peekable();
    let rows = rows_iter
        .by_ref()
        .take(max_buffer_rows.unwrap_or(usize::MAX))
        .collect::<ConvertResult<Vec<Vec<Scalar>>>>()?;

    let table = RawTable::new(source_id, label, header, rows);
    if rows_iter.peek().is_some() {
        return Ok(table.with_pending(PendingRows::new(rows_iter)));
    }
    Ok(table)
}

fn top_level_field_names<R: ChunkReader + 'static>(reader: &SerializedFileReader<R>) -> Vec<String> {
    reader
        .metadata()
        .file_metadata()
        .schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect()
}

fn field_to_scalar(f: &Field) -> Scalar {
    match f {
        Field::Null => Scalar::Null,
        Field::Bool(b) => Scalar::Boolean(*b),
        Field::Byte(v) => Scalar::Integer(i64::from(*v)),
        Field::Short(v) => Scalar::Integer(i64::from(*v)),
        Field::Int(v) => Scalar::Integer(i64::from(*v)),
        Field::Long(v) => Scalar::Integer(*v),
        Field::UByte(v) => Scalar::Integer(i64::from(*v)),
        Field::UShort(v) => Scalar::Integer(i64::from(*v)),
        Field::UInt(v) => Scalar::Integer(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v)
            .map(Scalar::Integer)
            .unwrap_or_else(|_| Scalar::Text(v.to_string())),
        Field::Float(v) => Scalar::Real(f64::from(*v)),
        Field::Double(v) => Scalar::Real(*v),
        Field::Str(s) => Scalar::Text(s.clone()),
        // Dates, timestamps, decimals, bytes and nested values keep their display form.
        other => Scalar::Text(other.to_string()),
    }
}
