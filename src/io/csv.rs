//! CSV datasets
//!
//! CSV has no types, so cells come back as text and each column is narrowed
//! afterwards: a column whose every plain-text cell parses as an integer
//! becomes an integer column, then float, then boolean. Cells written as
//! JSON arrays or objects (list-valued and nested fields) are decoded.
//!
//! Text that would read back as something else (the empty string, or text
//! that looks like a JSON array, object or string literal) is written as a
//! JSON string literal, so it survives a round trip unchanged.

use ::csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;
use tracing::warn;

use super::TableError;
use crate::core::table::{parse_bool, parse_float};
use crate::core::{Cell, Record, Scalar, Table};

pub fn read_csv(path: &Path) -> Result<Table, TableError> {
    let file = std::fs::File::open(path).map_err(|e| TableError::io(path, e))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let mut table = Table::new(headers.clone());

    for (index, result) in reader.records().enumerate() {
        let record = result?;
        let row: Record = headers
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let raw = record.get(i).unwrap_or("");
                (name.clone(), parse_cell(raw, name, index))
            })
            .collect();
        table.push_row(row);
    }

    for column in headers {
        narrow_column(&mut table, &column);
    }
    Ok(table)
}

pub fn write_csv(table: &Table, path: &Path) -> Result<(), TableError> {
    let file = std::fs::File::create(path).map_err(|e| TableError::io(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(file);

    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(
            table
                .columns()
                .iter()
                .map(|c| row.get(c).map(encode_cell).unwrap_or_default()),
        )?;
    }
    writer.flush().map_err(|e| TableError::io(path, e))?;
    Ok(())
}

fn encode_cell(cell: &Cell) -> String {
    match cell {
        Cell::Scalar(Scalar::Text(s)) if s.is_empty() || looks_like_json(s.trim()) || is_quoted(s.trim()) => {
            serde_json::Value::String(s.clone()).to_string()
        }
        other => other.to_string(),
    }
}

fn looks_like_json(text: &str) -> bool {
    (text.starts_with('[') && text.ends_with(']')) || (text.starts_with('{') && text.ends_with('}'))
}

fn is_quoted(text: &str) -> bool {
    text.len() >= 2 && text.starts_with('"') && text.ends_with('"')
}

/// Empty cells are missing; bracketed cells are decoded as JSON when possible
fn parse_cell(raw: &str, column: &str, row: usize) -> Cell {
    if raw.is_empty() {
        return Cell::Missing;
    }
    let trimmed = raw.trim();
    if looks_like_json(trimmed) {
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => return Cell::from_json(&value),
            Err(e) => warn!(column, row, "cannot decode JSON cell, keeping text: {}", e),
        }
    }
    // an escaped string literal; anything else in quotes is ordinary text
    if is_quoted(trimmed) {
        if let Ok(text) = serde_json::from_str::<String>(trimmed) {
            return Cell::text(text);
        }
    }
    Cell::text(raw)
}

fn narrow_column(table: &mut Table, column: &str) {
    let texts: Vec<&str> = table
        .column(column)
        .filter_map(|c| match c {
            Cell::Missing => None,
            Cell::Scalar(Scalar::Text(s)) => Some(s.as_str()),
            // decoded JSON: leave the column as it is
            _ => Some(""),
        })
        .collect();
    if texts.is_empty() {
        return;
    }

    let convert: fn(&str) -> Option<Scalar> = if texts.iter().all(|t| t.parse::<i64>().is_ok()) {
        |t| t.parse().ok().map(Scalar::Integer)
    } else if texts.iter().all(|t| parse_float(t).is_some()) {
        |t| parse_float(t).map(Scalar::Float)
    } else if texts.iter().all(|t| parse_bool(t).is_some()) {
        |t| parse_bool(t).map(Scalar::Bool)
    } else {
        return;
    };

    for row in table.rows_mut() {
        let narrowed = match row.get(column) {
            Some(Cell::Scalar(Scalar::Text(s))) => convert(s).map(Cell::Scalar),
            _ => None,
        };
        if let Some(cell) = narrowed {
            row.set(column, cell);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn read(contents: &str) -> Table {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cases.csv");
        std::fs::write(&path, contents).unwrap();
        read_csv(&path).unwrap()
    }

    #[test]
    fn test_column_types_are_inferred() {
        let table = read("name,year,score,flag\nA,1971,1.5,true\nB,,2,false\n");
        assert_eq!(table.cell(0, "name"), Some(&Cell::text("A")));
        assert_eq!(table.cell(0, "year"), Some(&Cell::integer(1971)));
        assert_eq!(table.cell(1, "year"), Some(&Cell::Missing));
        assert_eq!(table.cell(1, "score"), Some(&Cell::float(2.0)));
        assert_eq!(table.cell(1, "flag"), Some(&Cell::bool(false)));
    }

    #[test]
    fn test_mixed_column_stays_text() {
        let table = read("code\n12\nx12\n");
        assert_eq!(table.cell(0, "code"), Some(&Cell::text("12")));
    }

    #[test]
    fn test_json_cells_are_decoded() {
        let table = read("driver_type,note\n\"[\"\"climate\"\", \"\"harvest\"\"]\",\"[not json]\"\n");
        assert_eq!(table.cell(0, "driver_type"), Some(&Cell::texts(["climate", "harvest"])));
        assert_eq!(table.cell(0, "note"), Some(&Cell::text("[not json]")));
    }

    #[test]
    fn test_written_floats_keep_decimal_point() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let table = Table::from_records(vec![[("score", Cell::float(3.0))].into_iter().collect()]);
        write_csv(&table, &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().collect::<Vec<_>>(), vec!["score", "3.0"]);
    }

    #[test]
    fn test_ambiguous_text_survives_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        let texts = ["", "[\"x\"]", "{not json}", "\"quoted\"", "plain"];
        let table = Table::from_records(
            texts
                .iter()
                .map(|t| [("note", Cell::text(*t))].into_iter().collect())
                .collect::<Vec<_>>(),
        );
        write_csv(&table, &path).unwrap();

        let back = read_csv(&path).unwrap();
        for (i, text) in texts.iter().enumerate() {
            assert_eq!(back.cell(i, "note"), Some(&Cell::text(*text)), "row {}", i);
        }
    }
}
