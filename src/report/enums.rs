//! Reference table of the allowed values of every closed-vocabulary field

use serde_json::Value as JsonValue;
use std::io::Write;
use tabled::{builder::Builder, settings::Style};

use crate::schema::{NodeKind, Schema, SchemaNode};

/// One allowed value of one field
#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationRow {
    /// Dotted field path, e.g. `regime_shift_type.value`
    pub field: String,
    pub value: JsonValue,
    pub description: Option<String>,
}

impl EnumerationRow {
    /// Display form of the value: strings unquoted, everything else as JSON
    pub fn value_label(&self) -> String {
        match &self.value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Every allowed value of every enumerated field, in schema order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumerationTable {
    rows: Vec<EnumerationRow>,
}

impl EnumerationTable {
    pub fn rows(&self) -> &[EnumerationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Enumerated field paths, in order, without repeats
    pub fn fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = Vec::new();
        for row in &self.rows {
            if fields.last() != Some(&row.field.as_str()) {
                fields.push(&row.field);
            }
        }
        fields
    }

    /// Allowed values of one field
    pub fn values_of<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a EnumerationRow> + 'a {
        self.rows.iter().filter(move |r| r.field == field)
    }

    /// Export as `field,value,description` CSV
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(["field", "value", "description"])?;
        for row in &self.rows {
            writer.write_record([
                row.field.as_str(),
                row.value_label().as_str(),
                row.description.as_deref().unwrap_or(""),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Render as a terminal table
    pub fn to_table(&self) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Value", "Description"]);
        for row in &self.rows {
            builder.push_record([
                row.field.clone(),
                row.value_label(),
                row.description.clone().unwrap_or_default(),
            ]);
        }
        builder.build().with(Style::rounded()).to_string()
    }

    fn push(&mut self, row: EnumerationRow) {
        let duplicate = self
            .rows
            .iter()
            .any(|r| r.field == row.field && r.value == row.value);
        if !duplicate {
            self.rows.push(row);
        }
    }
}

/// Collect every enumerated field of the schema
///
/// Nested object fields are named with dotted paths. Arrays are transparent:
/// a list of enumerated values reports under the list field's own name.
pub fn derive_enumeration_table(schema: &Schema) -> EnumerationTable {
    let mut table = EnumerationTable::default();
    for property in schema.fields() {
        collect(&property.node, &property.name, &mut table);
    }
    table
}

fn collect(node: &SchemaNode, path: &str, table: &mut EnumerationTable) {
    match &node.kind {
        NodeKind::Enum(e) => {
            for value in &e.values {
                table.push(EnumerationRow {
                    field: path.to_string(),
                    value: value.value.clone(),
                    description: value.description.clone(),
                });
            }
        }
        NodeKind::Array(a) => collect(&a.items, path, table),
        NodeKind::Object(o) => {
            for property in &o.properties {
                collect(&property.node, &format!("{}.{}", path, property.name), table);
            }
        }
        NodeKind::Scalar(_) | NodeKind::Any => {}
    }
}
