//! Record validation with per-field violation reporting
//!
//! Every record is turned into a JSON instance and checked by a
//! `jsonschema` validator compiled once from the resolved document. Each
//! error is mapped back onto the record as a [`Violation`]; a malformed
//! record never produces an error of its own. Columns the schema does not
//! declare are left out of the instance, so datasets can carry extra columns.

use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::ValidationError;
use rayon::prelude::*;
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::core::{Cell, Record, Scalar};
use crate::core::config::DEFAULT_LIST_DELIMITER;

use super::diagnostics::SchemaError;
use super::loader::Schema;
use super::node::{JsonType, NodeKind, SchemaNode};

/// The constraint a violation breaks
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    MissingField,
    InvalidEnumValue { value: String },
    TypeMismatch { expected: String, found: String },
    PatternMismatch { pattern: String },
    FormatMismatch { format: String },
    OutOfRange { constraint: String },
    /// Any other keyword: `additionalProperties`, `uniqueItems`, `oneOf`, `not`, ...
    Constraint { keyword: String },
}

impl ViolationKind {
    pub fn name(&self) -> &'static str {
        match self {
            ViolationKind::MissingField => "MissingField",
            ViolationKind::InvalidEnumValue { .. } => "InvalidEnumValue",
            ViolationKind::TypeMismatch { .. } => "TypeMismatch",
            ViolationKind::PatternMismatch { .. } => "PatternMismatch",
            ViolationKind::FormatMismatch { .. } => "FormatMismatch",
            ViolationKind::OutOfRange { .. } => "OutOfRange",
            ViolationKind::Constraint { .. } => "Constraint",
        }
    }
}

/// A single mismatch between a record and the schema
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Path of the offending field, e.g. `driver_type[1]` or `main_contributors[0].name`
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Violations found in one record, in discovery order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidationResult {
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violation_count(&self) -> usize {
        self.violations.len()
    }

    /// Violations on a field or anywhere below it
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| {
            v.field == field
                || v.field.starts_with(&format!("{}[", field))
                || v.field.starts_with(&format!("{}.", field))
        })
    }

    /// All messages joined by newlines
    pub fn summary(&self) -> String {
        self.violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Validate records against a schema with default options
pub fn validate(records: &[Record], schema: &Schema) -> Result<Vec<ValidationResult>, SchemaError> {
    Ok(Validator::new(schema)?.validate(records))
}

/// Schema validator compiled once from a resolved schema
#[derive(Debug)]
pub struct Validator<'s> {
    schema: &'s Schema,
    compiled: jsonschema::Validator,
    list_delimiter: char,
}

impl<'s> Validator<'s> {
    /// Compile the schema document; a pattern that does not compile is an integrity error
    pub fn new(schema: &'s Schema) -> Result<Self, SchemaError> {
        let compiled = jsonschema::options()
            .should_validate_formats(true)
            .build(schema.document())
            .map_err(|err| {
                SchemaError::integrity(
                    format!("#{}", err.instance_path),
                    format!("schema does not compile: {}", err),
                )
            })?;
        Ok(Self {
            schema,
            compiled,
            list_delimiter: DEFAULT_LIST_DELIMITER,
        })
    }

    /// Delimiter used to split list-valued fields stored as plain text
    pub fn with_list_delimiter(mut self, delimiter: char) -> Self {
        self.list_delimiter = delimiter;
        self
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// Validate records one after the other; results follow input order
    pub fn validate(&self, records: &[Record]) -> Vec<ValidationResult> {
        records.iter().map(|r| self.validate_record(r)).collect()
    }

    /// Validate records across the rayon pool; results follow input order
    pub fn validate_parallel(&self, records: &[Record]) -> Vec<ValidationResult> {
        records.par_iter().map(|r| self.validate_record(r)).collect()
    }

    pub fn validate_record(&self, record: &Record) -> ValidationResult {
        let instance = self.instance(record);
        let mut violations: Vec<Violation> = self
            .compiled
            .iter_errors(&instance)
            .map(|error| self.to_violation(&error))
            .collect();
        // group by column in declaration order; keyword order is kept within a column
        violations.sort_by_key(|v| self.field_rank(&v.field));
        ValidationResult { violations }
    }

    /// JSON instance for a record: declared columns only, absent cells left out
    fn instance(&self, record: &Record) -> JsonValue {
        let mut map = Map::new();
        for property in self.schema.fields() {
            let value = record
                .get(&property.name)
                .and_then(|cell| self.instance_value(&property.node, cell));
            if let Some(value) = value {
                map.insert(property.name.clone(), value);
            }
        }
        JsonValue::Object(map)
    }

    fn instance_value(&self, node: &SchemaNode, cell: &Cell) -> Option<JsonValue> {
        if cell.is_absent() {
            return None;
        }
        let value = match (&node.kind, cell) {
            (NodeKind::Array(array), Cell::Scalar(Scalar::Text(text))) => {
                let items: Vec<JsonValue> = text
                    .split(self.list_delimiter)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| element_from_text(&array.items, s))
                    .collect();
                if items.is_empty() {
                    return None;
                }
                JsonValue::Array(items)
            }
            (NodeKind::Array(_), Cell::Scalar(_)) => JsonValue::Array(vec![cell.to_json()]),
            (NodeKind::Array(array), Cell::List(items)) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| {
                        self.instance_value(&array.items, item)
                            .unwrap_or(JsonValue::Null)
                    })
                    .collect(),
            ),
            (NodeKind::Object(object), Cell::Object(fields)) => {
                let mut map = Map::new();
                for (name, field) in fields {
                    let value = match object.property(name) {
                        Some(property) => self.instance_value(&property.node, field),
                        None => (!field.is_absent()).then(|| field.to_json()),
                    };
                    if let Some(value) = value {
                        map.insert(name.clone(), value);
                    }
                }
                JsonValue::Object(map)
            }
            _ => cell.to_json(),
        };
        Some(value)
    }

    fn to_violation(&self, error: &ValidationError<'_>) -> Violation {
        let pointer = error.instance_path.as_str();
        let field = field_path(pointer);
        let shown = at(&field);
        let value = value_label(&error.instance);

        let (field, kind, message) = match &error.kind {
            ValidationErrorKind::Required { property } => {
                let name = property.as_str().map(String::from).unwrap_or_else(|| property.to_string());
                let field = if field.is_empty() {
                    name
                } else {
                    format!("{}.{}", field, name)
                };
                let message = format!("Missing required field: '{}'", field);
                (field, ViolationKind::MissingField, message)
            }
            ValidationErrorKind::Enum { options } => {
                let message = format!(
                    "Invalid value \"{}\" at '{}': must be one of: {}",
                    value,
                    shown,
                    options_label(options)
                );
                (field, ViolationKind::InvalidEnumValue { value }, message)
            }
            ValidationErrorKind::Constant { expected_value } => {
                let message = format!(
                    "Invalid value \"{}\" at '{}': must be {}",
                    value,
                    shown,
                    value_label(expected_value)
                );
                (field, ViolationKind::InvalidEnumValue { value }, message)
            }
            ValidationErrorKind::OneOfNotValid | ValidationErrorKind::AnyOf => {
                match self.node_at(pointer).map(|node| &node.kind) {
                    // `oneOf` of consts: a vocabulary with descriptions
                    Some(NodeKind::Enum(vocabulary)) => {
                        let message = format!(
                            "Invalid value \"{}\" at '{}': must be one of: {}",
                            value,
                            shown,
                            vocabulary.labels().join(", ")
                        );
                        (field, ViolationKind::InvalidEnumValue { value }, message)
                    }
                    _ => {
                        let message =
                            format!("Value at '{}' doesn't match any of the allowed schemas", shown);
                        (field, constraint(&error.kind), message)
                    }
                }
            }
            ValidationErrorKind::Type { kind } => {
                let expected = match kind {
                    TypeKind::Single(t) => t.to_string(),
                    TypeKind::Multiple(types) => (*types)
                        .into_iter()
                        .map(|t| t.to_string())
                        .collect::<Vec<_>>()
                        .join(" or "),
                };
                let found = json_type(&error.instance).to_string();
                let message = format!("Wrong type at '{}': expected {}, found {}", shown, expected, found);
                (field, ViolationKind::TypeMismatch { expected, found }, message)
            }
            ValidationErrorKind::Pattern { pattern } => {
                let message = format!(
                    "Value \"{}\" at '{}' doesn't match pattern: {}",
                    value, shown, pattern
                );
                let kind = ViolationKind::PatternMismatch {
                    pattern: pattern.clone(),
                };
                (field, kind, message)
            }
            ValidationErrorKind::Format { format } => {
                let message = format!("Value \"{}\" at '{}' is not a valid {}", value, shown, format);
                let kind = ViolationKind::FormatMismatch {
                    format: format.clone(),
                };
                (field, kind, message)
            }
            ValidationErrorKind::MinLength { limit } => {
                let message = format!("Value at '{}' is too short: minimum {} characters", shown, limit);
                (field, out_of_range(format!("minLength {}", limit)), message)
            }
            ValidationErrorKind::MaxLength { limit } => {
                let message = format!("Value at '{}' is too long: maximum {} characters", shown, limit);
                (field, out_of_range(format!("maxLength {}", limit)), message)
            }
            ValidationErrorKind::Minimum { limit } => {
                let constraint = format!("minimum {}", limit);
                let message = format!("Value {} at '{}' is too small: {}", value, shown, constraint);
                (field, out_of_range(constraint), message)
            }
            ValidationErrorKind::ExclusiveMinimum { limit } => {
                let constraint = format!("exclusive minimum {}", limit);
                let message = format!("Value {} at '{}' is too small: {}", value, shown, constraint);
                (field, out_of_range(constraint), message)
            }
            ValidationErrorKind::Maximum { limit } => {
                let constraint = format!("maximum {}", limit);
                let message = format!("Value {} at '{}' is too large: {}", value, shown, constraint);
                (field, out_of_range(constraint), message)
            }
            ValidationErrorKind::ExclusiveMaximum { limit } => {
                let constraint = format!("exclusive maximum {}", limit);
                let message = format!("Value {} at '{}' is too large: {}", value, shown, constraint);
                (field, out_of_range(constraint), message)
            }
            ValidationErrorKind::MultipleOf { multiple_of } => {
                let message = format!("Value {} at '{}' is not a multiple of {}", value, shown, multiple_of);
                (field, out_of_range(format!("multipleOf {}", multiple_of)), message)
            }
            ValidationErrorKind::MinItems { limit } => {
                let message = format!("List at '{}' has too few items: minimum {}", shown, limit);
                (field, out_of_range(format!("minItems {}", limit)), message)
            }
            ValidationErrorKind::MaxItems { limit } => {
                let message = format!("List at '{}' has too many items: maximum {}", shown, limit);
                (field, out_of_range(format!("maxItems {}", limit)), message)
            }
            ValidationErrorKind::AdditionalProperties { unexpected } => {
                let message = format!("Unknown field(s) at '{}': {}", shown, unexpected.join(", "));
                (field, constraint(&error.kind), message)
            }
            ValidationErrorKind::UniqueItems => {
                let message = format!("List at '{}' has duplicate items", shown);
                (field, constraint(&error.kind), message)
            }
            _ => {
                let keyword = error
                    .schema_path
                    .as_str()
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let message = format!("Validation error at '{}': {}", shown, error);
                (field, ViolationKind::Constraint { keyword }, message)
            }
        };
        Violation { field, kind, message }
    }

    /// Schema node describing the value at a JSON pointer into the instance
    fn node_at(&self, pointer: &str) -> Option<&SchemaNode> {
        let mut segments = pointer.split('/').skip(1).map(unescape);
        let first = segments.next()?;
        let mut node = &self.schema.field(&first)?.node;
        for segment in segments {
            node = match &node.kind {
                NodeKind::Array(array) => array.items.as_ref(),
                NodeKind::Object(object) => &object.property(&segment)?.node,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Position of the violation's column in the schema
    fn field_rank(&self, field: &str) -> usize {
        let column = field.split(['[', '.']).next().unwrap_or(field);
        self.schema
            .fields()
            .iter()
            .position(|p| p.name == column)
            .unwrap_or(usize::MAX)
    }
}

/// Type a delimited list element from the declared item schema
///
/// Text stays text wherever the items accept strings; numbers and booleans
/// are only inferred for items that cannot be strings.
fn element_from_text(items: &SchemaNode, text: &str) -> JsonValue {
    let as_text = JsonValue::String(text.to_string());
    let keep_text = match &items.kind {
        NodeKind::Enum(vocabulary) => {
            vocabulary.values.iter().any(|v| v.value == as_text)
                || !vocabulary
                    .values
                    .iter()
                    .any(|v| v.value.is_number() || v.value.is_boolean())
        }
        _ => items.types.is_empty() || items.types.contains(&JsonType::String),
    };
    if keep_text {
        as_text
    } else {
        Cell::Scalar(Scalar::infer(text)).to_json()
    }
}

fn out_of_range(constraint: String) -> ViolationKind {
    ViolationKind::OutOfRange { constraint }
}

fn constraint(kind: &ValidationErrorKind) -> ViolationKind {
    let keyword = match kind {
        ValidationErrorKind::AdditionalProperties { .. } => "additionalProperties",
        ValidationErrorKind::UniqueItems => "uniqueItems",
        ValidationErrorKind::AnyOf => "anyOf",
        _ => "oneOf",
    };
    ViolationKind::Constraint {
        keyword: keyword.to_string(),
    }
}

/// `/main_contributors/1/name` becomes `main_contributors[1].name`
fn field_path(pointer: &str) -> String {
    let mut out = String::new();
    for segment in pointer.split('/').skip(1).map(unescape) {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(&segment);
            out.push(']');
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(&segment);
        }
    }
    out
}

fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn at(field: &str) -> &str {
    if field.is_empty() {
        "record"
    } else {
        field
    }
}

/// Strings unquoted, everything else as compact JSON
fn value_label(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn options_label(options: &JsonValue) -> String {
    match options.as_array() {
        Some(values) => values.iter().map(value_label).collect::<Vec<_>>().join(", "),
        None => value_label(options),
    }
}

/// An integral number counts as an integer
fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "integer",
        JsonValue::Number(n) if n.as_f64().is_some_and(|f| f.fract() == 0.0) => "integer",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
