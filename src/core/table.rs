//! In-memory tabular model: cells, records and tables
//!
//! A [`Table`] is an ordered list of column names plus rows. Each row is a
//! [`Record`] carrying every column of the table in column order; cells the
//! source file left empty are [`Cell::Missing`].

use serde_json::{Map, Number, Value as JsonValue};
use std::fmt;

/// A single scalar cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Infer the narrowest scalar for a piece of text (integer, float, boolean, text)
    pub fn infer(text: &str) -> Self {
        if let Ok(i) = text.parse::<i64>() {
            Scalar::Integer(i)
        } else if let Some(f) = parse_float(text) {
            Scalar::Float(f)
        } else if let Some(b) = parse_bool(text) {
            Scalar::Bool(b)
        } else {
            Scalar::Text(text.to_string())
        }
    }
}

/// Parse a float, refusing words such as `NaN` or `inf` that `f64::from_str` accepts
pub(crate) fn parse_float(text: &str) -> Option<f64> {
    if !text.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse::<f64>().ok()
}

pub(crate) fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// A table cell: absent, a scalar, a list (one-to-many field) or a nested object
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Missing,
    Scalar(Scalar),
    List(Vec<Cell>),
    Object(Vec<(String, Cell)>),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Scalar(Scalar::Text(s.into()))
    }

    pub fn integer(i: i64) -> Self {
        Cell::Scalar(Scalar::Integer(i))
    }

    pub fn float(f: f64) -> Self {
        Cell::Scalar(Scalar::Float(f))
    }

    pub fn bool(b: bool) -> Self {
        Cell::Scalar(Scalar::Bool(b))
    }

    /// A list of text values
    pub fn texts<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Cell::List(items.into_iter().map(Cell::text).collect())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Missing, or an empty list
    pub fn is_absent(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Cell::Scalar(Scalar::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// JSON type name of the cell, as used in schema `type` declarations
    pub fn json_type(&self) -> &'static str {
        match self {
            Cell::Missing => "null",
            Cell::Scalar(Scalar::Bool(_)) => "boolean",
            Cell::Scalar(Scalar::Integer(_)) => "integer",
            Cell::Scalar(Scalar::Float(_)) => "number",
            Cell::Scalar(Scalar::Text(_)) => "string",
            Cell::List(_) => "array",
            Cell::Object(_) => "object",
        }
    }

    /// Convert a JSON value into a cell (`null` becomes `Missing`)
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Cell::Missing,
            JsonValue::Bool(b) => Cell::bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Cell::integer(i),
                None => Cell::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Cell::text(s.clone()),
            JsonValue::Array(items) => Cell::List(items.iter().map(Cell::from_json).collect()),
            JsonValue::Object(map) => Cell::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Cell::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert the cell into a JSON value (`Missing` and non-finite floats become `null`)
    pub fn to_json(&self) -> JsonValue {
        match self {
            Cell::Missing => JsonValue::Null,
            Cell::Scalar(Scalar::Bool(b)) => JsonValue::Bool(*b),
            Cell::Scalar(Scalar::Integer(i)) => JsonValue::Number((*i).into()),
            Cell::Scalar(Scalar::Float(f)) => Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Cell::Scalar(Scalar::Text(s)) => JsonValue::String(s.clone()),
            Cell::List(items) => JsonValue::Array(items.iter().map(Cell::to_json).collect()),
            Cell::Object(fields) => {
                let mut map = Map::new();
                for (k, v) in fields {
                    map.insert(k.clone(), v.to_json());
                }
                JsonValue::Object(map)
            }
        }
    }
}

impl fmt::Display for Cell {
    /// Text is shown raw, composite values as compact JSON, `Missing` as nothing
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Missing => Ok(()),
            Cell::Scalar(Scalar::Text(s)) => f.write_str(s),
            Cell::Scalar(Scalar::Integer(i)) => write!(f, "{}", i),
            Cell::Scalar(Scalar::Float(x)) => write!(f, "{:?}", x),
            Cell::Scalar(Scalar::Bool(b)) => write!(f, "{}", b),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

/// One row of a dataset: field name to cell, in column order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Cell)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Set a field, replacing its value in place or appending it at the end
    pub fn set(&mut self, name: impl Into<String>, cell: Cell) {
        let name = name.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some((_, slot)) => *slot = cell,
            None => self.fields.push((name, cell)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Cell> {
        let idx = self.fields.iter().position(|(k, _)| k == name)?;
        Some(self.fields.remove(idx).1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Cell)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, Cell)>>(iter: T) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.set(k, v);
        }
        record
    }
}

/// A dataset: ordered columns and rows that all carry every column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    /// An empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from records; columns are the union of record fields in first-seen order
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut table = Table::default();
        for record in records {
            table.push_row(record);
        }
        table
    }

    /// Append a row, adding any new columns to the table
    pub fn push_row(&mut self, record: Record) {
        for name in record.names() {
            if !self.columns.iter().any(|c| c == name) {
                self.add_column(name.to_string());
            }
        }
        let mut record = record;
        let row = self
            .columns
            .iter()
            .map(|c| (c.clone(), record.remove(c).unwrap_or_default()))
            .collect();
        self.rows.push(row);
    }

    /// Add a column filled with `Missing`; no-op if the column exists
    pub fn add_column(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.columns.contains(&name) {
            return;
        }
        for row in &mut self.rows {
            row.set(name.clone(), Cell::Missing);
        }
        self.columns.push(name);
    }

    /// Remove a column from the table and every row
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.columns.iter().position(|c| c == name) else {
            return false;
        };
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(name);
        }
        true
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Record] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of one column, top to bottom
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.rows
            .iter()
            .map(move |row| row.get(name).unwrap_or(&Cell::Missing))
    }

    /// The cell at `row`, `column`
    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}
