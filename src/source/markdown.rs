//! Markdown pipe-table reader.
//!
//! A table is a header row followed by a delimiter row (`| --- | :-: |`) with the same number
//! of cells, then every following line that contains a `|`. Body rows are padded or truncated
//! to the header width, as markdown renderers do. Cells are trimmed; `\|` is a literal pipe.

use std::fs;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ConvertResult;
use crate::types::{RawTable, Scalar};

use super::unified::{SourceFormat, SourceHandle, SourceTables};

static DELIMITER_ROW: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\|?\s*:?-+:?\s*(\|\s*:?-+:?\s*)*\|?$").ok());

/// Read every pipe table in a markdown document.
///
/// A single table is labelled with the file stem; several are labelled `table_1`, `table_2`...
pub fn read_markdown_source(handle: &SourceHandle) -> ConvertResult<SourceTables> {
    let text = fs::read_to_string(&handle.path)?;
    let tables = read_markdown_tables(&text, &handle.source_id(), &handle.stem());
    Ok(SourceTables::from_tables(handle, SourceFormat::Markdown, tables))
}

/// Parse markdown text into raw tables.
pub fn read_markdown_tables(input: &str, source_id: &str, label: &str) -> Vec<RawTable> {
    let lines: Vec<&str> = input.lines().map(str::trim).collect();
    let mut parsed: Vec<(Vec<String>, Vec<Vec<String>>)> = Vec::new();

    let mut i = 0;
    while i + 1 < lines.len() {
        let header = lines[i];
        if !header.contains('|') || !is_delimiter_row(lines[i + 1]) {
            i += 1;
            continue;
        }
        let header_cells = split_row(header);
        if split_row(lines[i + 1]).len() != header_cells.len() {
            i += 1;
            continue;
        }

        i += 2;
        let mut body = Vec::new();
        while i < lines.len() && !lines[i].is_empty() && lines[i].contains('|') {
            let mut cells = split_row(lines[i]);
            cells.resize(header_cells.len(), String::new());
            body.push(cells);
            i += 1;
        }
        parsed.push((header_cells, body));
    }

    let multi = parsed.len() > 1;
    parsed
        .into_iter()
        .enumerate()
        .map(|(idx, (header, body))| {
            let table_label = if multi {
                format!("table_{}", idx + 1)
            } else {
                label.to_string()
            };
            let rows = body
                .into_iter()
                .map(|cells| cells.into_iter().map(Scalar::Text).collect())
                .collect();
            RawTable::new(source_id, table_label, header, rows)
        })
        .collect()
}

fn is_delimiter_row(line: &str) -> bool {
    line.contains('-')
        && DELIMITER_ROW
            .as_ref()
            .is_some_and(|re| re.is_match(line))
}

fn split_row(line: &str) -> Vec<String> {
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = match line.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => line,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('|');
                chars.next();
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(c),
        }
    }
    cells.push(current.trim().to_string());
    cells
}
