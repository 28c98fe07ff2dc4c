#![cfg(feature = "excel")]

use std::fs::File;
use std::io::BufReader;
use std::vec;

use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};

use crate::error::{ConvertError, ConvertResult};
use crate::types::{RawTable, Scalar};

use super::unified::{ExcelSheetSelection, SourceFormat, SourceHandle, SourceTables};

/// Read an Excel document (`.xlsx`, `.xls`, `.ods`, etc.) as a multi-table source.
///
/// Behavior:
/// - one table per selected sheet, labelled with the sheet name, read lazily in order
/// - the first non-empty row of a sheet is its header
/// - sheets without any non-empty row are skipped
/// - fully empty rows below the header are skipped
pub fn read_excel_source(handle: &SourceHandle, selection: &ExcelSheetSelection) -> ConvertResult<SourceTables> {
    let workbook = open_workbook_auto(&handle.path)?;

    let sheets: Vec<String> = match selection {
        ExcelSheetSelection::All => workbook.sheet_names().to_vec(),
        ExcelSheetSelection::Sheet(name) => vec![name.clone()],
        ExcelSheetSelection::Sheets(names) => names.clone(),
    };
    if sheets.is_empty() {
        return Err(ConvertError::source_read(handle.source_id(), "workbook has no sheets"));
    }

    let multi_table = sheets.len() > 1;
    let tables = SheetTables {
        workbook,
        sheets: sheets.into_iter(),
        source_id: handle.source_id(),
    };
    Ok(SourceTables::new(handle, SourceFormat::Excel, multi_table, tables))
}

struct SheetTables {
    workbook: Sheets<BufReader<File>>,
    sheets: vec::IntoIter<String>,
    source_id: String,
}

impl Iterator for SheetTables {
    type Item = ConvertResult<RawTable>;

    fn next(&mut self) -> Option<Self::Item> {
        for sheet in self.sheets.by_ref() {
            let range = match self.workbook.worksheet_range(&sheet) {
                Ok(range) => range,
                Err(e) => return Some(Err(e.into())),
            };
            match sheet_to_table(&self.source_id, &sheet, &range) {
                Some(table) => return Some(Ok(table)),
                None => tracing::debug!(sheet = %sheet, "skipping empty sheet"),
            }
        }
        None
    }
}

fn sheet_to_table(source_id: &str, sheet: &str, range: &Range<Data>) -> Option<RawTable> {
    let mut rows_iter = range
        .rows()
        .skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));
    let header: Vec<String> = rows_iter.next()?.iter().map(cell_to_header_string).collect();

    let rows = rows_iter
        .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| row.iter().map(cell_to_scalar).collect())
        .collect();

    Some(RawTable::new(source_id, sheet, header, rows))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_scalar(c: &Data) -> Scalar {
    match c {
        Data::Empty => Scalar::Null,
        Data::Int(i) => Scalar::Integer(*i),
        Data::Float(f) => Scalar::Real(*f),
        Data::Bool(b) => Scalar::Boolean(*b),
        Data::String(s) => Scalar::Text(s.clone()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Scalar::Text(s.clone()),
        Data::Error(e) => Scalar::Text(format!("{e:?}")),
        other => Scalar::Text(other.to_string()),
    }
}
