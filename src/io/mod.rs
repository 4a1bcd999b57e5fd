//! Tabular I/O for RSDB datasets
//!
//! A dataset is a single CSV or Parquet file. The format is chosen from the
//! file extension alone, for both reading and writing.

pub mod csv;
pub mod parquet;

use miette::Diagnostic;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::core::Table;

/// Errors raised while reading or writing a dataset
#[derive(Debug, Error, Diagnostic)]
pub enum TableError {
    #[error("Unsupported file '{path}': file name must end with .parquet or .csv")]
    #[diagnostic(code(rsdb::io::format))]
    UnsupportedFormat { path: PathBuf },

    #[error("I/O error on '{path}': {source}")]
    #[diagnostic(code(rsdb::io::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    #[diagnostic(code(rsdb::io::csv))]
    Csv(#[from] ::csv::Error),

    #[error("Parquet error: {0}")]
    #[diagnostic(code(rsdb::io::parquet))]
    Parquet(#[from] ::parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    #[diagnostic(code(rsdb::io::arrow))]
    Arrow(#[from] ::arrow::error::ArrowError),

    #[error("Column '{column}' holds invalid JSON: {source}")]
    #[diagnostic(code(rsdb::io::json))]
    Json {
        column: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TableError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        TableError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// On-disk dataset format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
}

impl TableFormat {
    /// Pick the format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("csv") => Ok(TableFormat::Csv),
            Some("parquet") => Ok(TableFormat::Parquet),
            _ => Err(TableError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

impl fmt::Display for TableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFormat::Csv => write!(f, "csv"),
            TableFormat::Parquet => write!(f, "parquet"),
        }
    }
}

/// Read a dataset file into a table
pub fn read_table(path: impl AsRef<Path>) -> Result<Table, TableError> {
    let path = path.as_ref();
    let format = TableFormat::from_path(path)?;
    let table = match format {
        TableFormat::Csv => csv::read_csv(path)?,
        TableFormat::Parquet => parquet::read_parquet(path)?,
    };
    debug!(
        path = %path.display(),
        %format,
        rows = table.len(),
        columns = table.columns().len(),
        "dataset read"
    );
    Ok(table)
}

/// Write a table to a dataset file, replacing any existing file
pub fn write_table(table: &Table, path: impl AsRef<Path>) -> Result<(), TableError> {
    let path = path.as_ref();
    let format = TableFormat::from_path(path)?;
    match format {
        TableFormat::Csv => csv::write_csv(table, path)?,
        TableFormat::Parquet => parquet::write_parquet(table, path)?,
    }
    debug!(path = %path.display(), %format, rows = table.len(), "dataset written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Cell;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Table {
        Table::from_records(vec![
            [
                ("case_study_name", Cell::text("Balinese rice")),
                ("year_of_shift", Cell::integer(1971)),
                ("score", Cell::float(0.5)),
                ("published", Cell::bool(true)),
                ("driver_type", Cell::texts(["climate", "governance"])),
                (
                    "main_contributors",
                    Cell::from_json(&json!([{"name": "A. Author", "orcid": null}])),
                ),
            ]
            .into_iter()
            .collect(),
            [
                ("case_study_name", Cell::text("Kelp forests")),
                ("year_of_shift", Cell::Missing),
                ("score", Cell::float(2.0)),
                ("published", Cell::bool(false)),
                ("driver_type", Cell::texts(["harvest"])),
                ("main_contributors", Cell::Missing),
            ]
            .into_iter()
            .collect(),
        ])
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(TableFormat::from_path(Path::new("a.csv")).unwrap(), TableFormat::Csv);
        assert_eq!(
            TableFormat::from_path(Path::new("dir/A.PARQUET")).unwrap(),
            TableFormat::Parquet
        );
        assert!(matches!(
            TableFormat::from_path(Path::new("data.xlsx")),
            Err(TableError::UnsupportedFormat { .. })
        ));
        assert!(TableFormat::from_path(Path::new("noextension")).is_err());
    }

    #[test]
    fn test_unsupported_format_message() {
        let err = read_table("cases.json").unwrap_err();
        assert!(err.to_string().contains("must end with .parquet or .csv"));
    }

    #[test]
    fn test_csv_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cases.csv");
        let table = sample();
        write_table(&table, &path).unwrap();
        assert_eq!(read_table(&path).unwrap(), table);
    }

    #[test]
    fn test_parquet_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cases.parquet");
        let table = sample();
        write_table(&table, &path).unwrap();
        assert_eq!(read_table(&path).unwrap(), table);
    }

    #[test]
    fn test_convert_between_formats() {
        let tmp = TempDir::new().unwrap();
        let csv_path = tmp.path().join("cases.csv");
        let parquet_path = tmp.path().join("cases.parquet");
        write_table(&sample(), &csv_path).unwrap();
        write_table(&read_table(&csv_path).unwrap(), &parquet_path).unwrap();
        assert_eq!(read_table(&parquet_path).unwrap(), sample());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_table("/nonexistent/cases.csv").unwrap_err();
        assert!(matches!(err, TableError::Io { .. }), "{:?}", err);
    }
}
