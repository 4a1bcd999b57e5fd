//! Parquet datasets
//!
//! Homogeneous columns map to native Arrow types (`Boolean`, `Int64`,
//! `Float64`, `Utf8`). Columns holding lists, nested objects or a mix of
//! scalar types are stored as JSON text and tagged with the field metadata
//! `rsdb:encoding=json` so they decode back into the same cells. Files
//! written by other tools are read through their native Arrow types.

use ::arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray,
};
use ::arrow::datatypes::{
    DataType, Field, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type,
    Schema as ArrowSchema, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use ::arrow::error::ArrowError;
use ::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use ::arrow::util::display::array_value_to_string;
use ::parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use ::parquet::arrow::ArrowWriter;
use ::parquet::basic::Compression;
use ::parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use super::TableError;
use crate::core::{Cell, Record, Scalar, Table};

/// Field metadata key marking a JSON-encoded column
pub const ENCODING_KEY: &str = "rsdb:encoding";
pub const JSON_ENCODING: &str = "json";

/// Storage chosen for one column when writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Empty,
    Bool,
    Integer,
    Float,
    Text,
    Json,
}

impl ColumnKind {
    fn of(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::Missing => None,
            Cell::Scalar(Scalar::Bool(_)) => Some(ColumnKind::Bool),
            Cell::Scalar(Scalar::Integer(_)) => Some(ColumnKind::Integer),
            Cell::Scalar(Scalar::Float(_)) => Some(ColumnKind::Float),
            Cell::Scalar(Scalar::Text(_)) => Some(ColumnKind::Text),
            Cell::List(_) | Cell::Object(_) => Some(ColumnKind::Json),
        }
    }

    /// A column keeps a native type only while every present cell agrees
    fn detect<'a>(cells: impl Iterator<Item = &'a Cell>) -> Self {
        cells.filter_map(ColumnKind::of).fold(ColumnKind::Empty, |acc, kind| {
            if acc == ColumnKind::Empty || acc == kind {
                kind
            } else {
                ColumnKind::Json
            }
        })
    }
}

pub fn write_parquet(table: &Table, path: &Path) -> Result<(), TableError> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns().len());

    for name in table.columns() {
        let kind = ColumnKind::detect(table.column(name));
        let (field, array) = encode_column(table, name, kind);
        fields.push(field);
        arrays.push(array);
    }

    let schema = Arc::new(ArrowSchema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(table.len()));
    let batch = RecordBatch::try_new_with_options(schema.clone(), arrays, &options)?;

    let file = File::create(path).map_err(|e| TableError::io(path, e))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn encode_column(table: &Table, name: &str, kind: ColumnKind) -> (Field, ArrayRef) {
    let cells = table.column(name);
    match kind {
        ColumnKind::Bool => (
            Field::new(name, DataType::Boolean, true),
            Arc::new(BooleanArray::from(
                cells
                    .map(|c| match c {
                        Cell::Scalar(Scalar::Bool(b)) => Some(*b),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
        ),
        ColumnKind::Integer => (
            Field::new(name, DataType::Int64, true),
            Arc::new(Int64Array::from(
                cells.map(Cell::as_integer).collect::<Vec<_>>(),
            )),
        ),
        ColumnKind::Float => (
            Field::new(name, DataType::Float64, true),
            Arc::new(Float64Array::from(
                cells
                    .map(|c| match c {
                        Cell::Scalar(Scalar::Float(f)) => Some(*f),
                        _ => None,
                    })
                    .collect::<Vec<_>>(),
            )),
        ),
        ColumnKind::Text | ColumnKind::Empty => (
            Field::new(name, DataType::Utf8, true),
            Arc::new(StringArray::from(
                cells
                    .map(|c| c.as_text().map(String::from))
                    .collect::<Vec<_>>(),
            )),
        ),
        ColumnKind::Json => {
            let metadata = HashMap::from([(ENCODING_KEY.to_string(), JSON_ENCODING.to_string())]);
            (
                Field::new(name, DataType::Utf8, true).with_metadata(metadata),
                Arc::new(StringArray::from(
                    cells
                        .map(|c| (!c.is_missing()).then(|| c.to_json().to_string()))
                        .collect::<Vec<_>>(),
                )),
            )
        }
    }
}

pub fn read_parquet(path: &Path) -> Result<Table, TableError> {
    let file = File::open(path).map_err(|e| TableError::io(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.build()?;

    let mut table = Table::new(schema.fields().iter().map(|f| f.name().clone()));
    for batch in reader {
        let batch = batch?;
        for row in 0..batch.num_rows() {
            let record = schema
                .fields()
                .iter()
                .zip(batch.columns())
                .map(|(field, array)| Ok((field.name().clone(), decode_cell(field, array.as_ref(), row)?)))
                .collect::<Result<Record, TableError>>()?;
            table.push_row(record);
        }
    }
    Ok(table)
}

fn is_json_encoded(field: &Field) -> bool {
    field.metadata().get(ENCODING_KEY).map(String::as_str) == Some(JSON_ENCODING)
}

fn decode_cell(field: &Field, array: &dyn Array, row: usize) -> Result<Cell, TableError> {
    if array.is_null(row) {
        return Ok(Cell::Missing);
    }
    if is_json_encoded(field) {
        if let Some(strings) = array.as_string_opt::<i32>() {
            let value: serde_json::Value =
                serde_json::from_str(strings.value(row)).map_err(|source| TableError::Json {
                    column: field.name().clone(),
                    source,
                })?;
            return Ok(Cell::from_json(&value));
        }
    }
    Ok(decode_value(array, row)?)
}

fn decode_value(array: &dyn Array, row: usize) -> Result<Cell, ArrowError> {
    if array.is_null(row) {
        return Ok(Cell::Missing);
    }
    let cell = match array.data_type() {
        DataType::Boolean => Cell::bool(array.as_boolean().value(row)),
        DataType::Int8 => Cell::integer(array.as_primitive::<Int8Type>().value(row).into()),
        DataType::Int16 => Cell::integer(array.as_primitive::<Int16Type>().value(row).into()),
        DataType::Int32 => Cell::integer(array.as_primitive::<Int32Type>().value(row).into()),
        DataType::Int64 => Cell::integer(array.as_primitive::<Int64Type>().value(row)),
        DataType::UInt8 => Cell::integer(array.as_primitive::<UInt8Type>().value(row).into()),
        DataType::UInt16 => Cell::integer(array.as_primitive::<UInt16Type>().value(row).into()),
        DataType::UInt32 => Cell::integer(array.as_primitive::<UInt32Type>().value(row).into()),
        DataType::UInt64 => {
            let value = array.as_primitive::<UInt64Type>().value(row);
            match i64::try_from(value) {
                Ok(i) => Cell::integer(i),
                Err(_) => Cell::float(value as f64),
            }
        }
        DataType::Float32 => Cell::float(array.as_primitive::<Float32Type>().value(row).into()),
        DataType::Float64 => Cell::float(array.as_primitive::<Float64Type>().value(row)),
        DataType::Utf8 => Cell::text(array.as_string::<i32>().value(row)),
        DataType::LargeUtf8 => Cell::text(array.as_string::<i64>().value(row)),
        DataType::List(_) => decode_list(array.as_list::<i32>().value(row).as_ref())?,
        DataType::LargeList(_) => decode_list(array.as_list::<i64>().value(row).as_ref())?,
        DataType::Struct(fields) => {
            let columns = array.as_struct().columns();
            Cell::Object(
                fields
                    .iter()
                    .zip(columns)
                    .map(|(f, column)| Ok((f.name().clone(), decode_value(column.as_ref(), row)?)))
                    .collect::<Result<_, ArrowError>>()?,
            )
        }
        _ => Cell::text(array_value_to_string(array, row)?),
    };
    Ok(cell)
}

fn decode_list(values: &dyn Array) -> Result<Cell, ArrowError> {
    (0..values.len())
        .map(|i| decode_value(values, i))
        .collect::<Result<Vec<_>, _>>()
        .map(Cell::List)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::arrow::array::{ListArray, StructArray};
    use tempfile::TempDir;

    fn roundtrip(table: &Table) -> Table {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cases.parquet");
        write_parquet(table, &path).unwrap();
        read_parquet(&path).unwrap()
    }

    #[test]
    fn test_column_kind_detection() {
        let cells = [Cell::integer(1), Cell::Missing, Cell::integer(2)];
        assert_eq!(ColumnKind::detect(cells.iter()), ColumnKind::Integer);
        let mixed = [Cell::integer(1), Cell::float(2.5)];
        assert_eq!(ColumnKind::detect(mixed.iter()), ColumnKind::Json);
        let empty = [Cell::Missing, Cell::Missing];
        assert_eq!(ColumnKind::detect(empty.iter()), ColumnKind::Empty);
    }

    #[test]
    fn test_mixed_and_empty_columns_roundtrip() {
        let table = Table::from_records(vec![
            [
                ("mixed", Cell::integer(1)),
                ("nothing", Cell::Missing),
                ("nested", Cell::Object(vec![("name".to_string(), Cell::text("A"))])),
            ]
            .into_iter()
            .collect(),
            [
                ("mixed", Cell::text("two")),
                ("nothing", Cell::Missing),
                ("nested", Cell::Missing),
            ]
            .into_iter()
            .collect(),
        ]);
        assert_eq!(roundtrip(&table), table);
    }

    #[test]
    fn test_json_columns_are_tagged() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cases.parquet");
        let table = Table::from_records(vec![
            [("driver_type", Cell::texts(["climate"])), ("name", Cell::text("A"))]
                .into_iter()
                .collect(),
        ]);
        write_parquet(&table, &path).unwrap();

        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap()).unwrap();
        let schema = builder.schema();
        assert!(is_json_encoded(schema.field_with_name("driver_type").unwrap()));
        assert!(!is_json_encoded(schema.field_with_name("name").unwrap()));
    }

    #[test]
    fn test_zero_rows() {
        let table = Table::new(["case_study_name", "driver_type"]);
        let back = roundtrip(&table);
        assert_eq!(back.columns(), table.columns());
        assert!(back.is_empty());
    }

    #[test]
    fn test_native_list_and_struct_columns() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("native.parquet");

        let list = ListArray::from_iter_primitive::<Int32Type, _, _>(vec![
            Some(vec![Some(1), Some(2)]),
            None,
        ]);
        let names: ArrayRef = Arc::new(StringArray::from(vec![Some("A"), None]));
        let person = StructArray::from(vec![(
            Arc::new(Field::new("name", DataType::Utf8, true)),
            names,
        )]);
        let batch = RecordBatch::try_from_iter(vec![
            ("numbers", Arc::new(list) as ArrayRef),
            ("person", Arc::new(person) as ArrayRef),
        ])
        .unwrap();
        let mut writer = ArrowWriter::try_new(File::create(&path).unwrap(), batch.schema(), None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = read_parquet(&path).unwrap();
        assert_eq!(
            table.cell(0, "numbers"),
            Some(&Cell::List(vec![Cell::integer(1), Cell::integer(2)]))
        );
        assert_eq!(table.cell(1, "numbers"), Some(&Cell::Missing));
        assert_eq!(
            table.cell(0, "person"),
            Some(&Cell::Object(vec![("name".to_string(), Cell::text("A"))]))
        );
        assert_eq!(
            table.cell(1, "person"),
            Some(&Cell::Object(vec![("name".to_string(), Cell::Missing)]))
        );
    }
}
