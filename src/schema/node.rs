//! Resolved schema tree
//!
//! A dereferenced JSON Schema document is turned into a tree of
//! [`SchemaNode`]s once, at load time. Each node owns its children, so the
//! validator and the enumeration export walk plain data with no further
//! lookups.

use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::str::FromStr;

use super::diagnostics::SchemaError;

/// Primitive JSON type names usable in a `type` declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    Array,
    Object,
}

impl JsonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::String => "string",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Null => "null",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }
}

impl FromStr for JsonType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(JsonType::String),
            "integer" => Ok(JsonType::Integer),
            "number" => Ok(JsonType::Number),
            "boolean" => Ok(JsonType::Boolean),
            "null" => Ok(JsonType::Null),
            "array" => Ok(JsonType::Array),
            "object" => Ok(JsonType::Object),
            other => Err(format!("unknown type '{}'", other)),
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One node of the resolved schema tree
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub kind: NodeKind,
    /// Declared types; empty means unconstrained
    pub types: Vec<JsonType>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Object(ObjectNode),
    Array(ArrayNode),
    Scalar(ScalarNode),
    Enum(EnumNode),
    Any,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectNode {
    /// Properties in declaration order
    pub properties: Vec<Property>,
}

impl ObjectNode {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub required: bool,
    pub node: SchemaNode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayNode {
    pub items: Box<SchemaNode>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

/// Numeric bound, optionally exclusive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub exclusive: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarNode {
    pub pattern: Option<String>,
    pub format: Option<String>,
    pub minimum: Option<Bound>,
    pub maximum: Option<Bound>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumNode {
    /// Allowed values in declaration order
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub value: JsonValue,
    pub description: Option<String>,
}

impl EnumValue {
    /// Display form: strings unquoted, everything else as JSON
    pub fn label(&self) -> String {
        match &self.value {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl EnumNode {
    pub fn labels(&self) -> Vec<String> {
        self.values.iter().map(EnumValue::label).collect()
    }
}

impl SchemaNode {
    /// A node with no constraints
    pub fn any() -> Self {
        SchemaNode {
            kind: NodeKind::Any,
            types: Vec::new(),
            title: None,
            description: None,
        }
    }

    /// True when the node explicitly admits `null`
    pub fn allows_null(&self) -> bool {
        if self.types.contains(&JsonType::Null) {
            return true;
        }
        match &self.kind {
            NodeKind::Enum(e) => e.values.iter().any(|v| v.value.is_null()),
            NodeKind::Any => self.types.is_empty(),
            _ => false,
        }
    }

    /// Short type label for listings, e.g. `string`, `string[]`, `enum`
    pub fn type_label(&self) -> String {
        match &self.kind {
            NodeKind::Array(a) => format!("{}[]", a.items.type_label()),
            NodeKind::Object(_) => "object".to_string(),
            NodeKind::Enum(_) => "enum".to_string(),
            NodeKind::Any if self.types.is_empty() => "any".to_string(),
            _ => self
                .types
                .iter()
                .filter(|t| **t != JsonType::Null)
                .map(JsonType::as_str)
                .collect::<Vec<_>>()
                .join("|"),
        }
    }

    /// Build a node from a dereferenced schema value; `path` locates it for error messages
    pub fn from_json(value: &JsonValue, path: &str) -> Result<Self, SchemaError> {
        let map = match value {
            JsonValue::Bool(_) => return Ok(SchemaNode::any()),
            JsonValue::Object(map) => flatten_all_of(map, path)?,
            other => {
                return Err(SchemaError::integrity(
                    path,
                    format!("expected a schema object, found {}", other),
                ))
            }
        };

        let types = parse_types(&map, path)?;
        let title = map.get("title").and_then(|v| v.as_str()).map(String::from);
        let description = map
            .get("description")
            .and_then(|v| v.as_str())
            .map(String::from);

        let kind = if let Some(node) = parse_enum(&map, path)? {
            NodeKind::Enum(node)
        } else if types.contains(&JsonType::Object) || map.contains_key("properties") {
            NodeKind::Object(parse_object(&map, path)?)
        } else if types.contains(&JsonType::Array) || map.contains_key("items") {
            NodeKind::Array(parse_array(&map, path)?)
        } else if !types.is_empty() || SCALAR_KEYWORDS.iter().any(|k| map.contains_key(*k)) {
            NodeKind::Scalar(parse_scalar(&map, path)?)
        } else {
            NodeKind::Any
        };

        Ok(SchemaNode {
            kind,
            types,
            title,
            description,
        })
    }
}

const SCALAR_KEYWORDS: &[&str] = &[
    "pattern",
    "format",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
];

/// Merge `allOf` members into their parent schema; keys already on the parent win
fn flatten_all_of(map: &Map<String, JsonValue>, path: &str) -> Result<Map<String, JsonValue>, SchemaError> {
    let mut merged = map.clone();
    let Some(all_of) = merged.remove("allOf") else {
        return Ok(merged);
    };
    let members = all_of
        .as_array()
        .ok_or_else(|| SchemaError::integrity(path, "'allOf' must be an array"))?;

    for (i, member) in members.iter().enumerate() {
        let member_path = format!("{}/allOf/{}", path, i);
        let member = match member {
            JsonValue::Object(m) => flatten_all_of(m, &member_path)?,
            JsonValue::Bool(_) => continue,
            _ => return Err(SchemaError::integrity(member_path, "expected a schema object")),
        };
        for (key, value) in member {
            match merged.get_mut(&key) {
                Some(JsonValue::Object(existing)) if key == "properties" => {
                    if let JsonValue::Object(props) = value {
                        for (name, prop) in props {
                            existing.entry(name).or_insert(prop);
                        }
                    }
                }
                Some(JsonValue::Array(existing)) if key == "required" => {
                    if let JsonValue::Array(names) = value {
                        for name in names {
                            if !existing.contains(&name) {
                                existing.push(name);
                            }
                        }
                    }
                }
                Some(_) => {}
                None => {
                    merged.insert(key, value);
                }
            }
        }
    }
    Ok(merged)
}

fn parse_types(map: &Map<String, JsonValue>, path: &str) -> Result<Vec<JsonType>, SchemaError> {
    let parse_one = |v: &JsonValue| -> Result<JsonType, SchemaError> {
        let name = v
            .as_str()
            .ok_or_else(|| SchemaError::integrity(format!("{}/type", path), "type names must be strings"))?;
        name.parse()
            .map_err(|e: String| SchemaError::integrity(format!("{}/type", path), e))
    };

    match map.get("type") {
        None => Ok(Vec::new()),
        Some(JsonValue::Array(names)) => names.iter().map(parse_one).collect(),
        Some(single) => Ok(vec![parse_one(single)?]),
    }
}

/// `enum`, `const`, or a `oneOf`/`anyOf` whose branches are all `const`s
fn parse_enum(map: &Map<String, JsonValue>, path: &str) -> Result<Option<EnumNode>, SchemaError> {
    if let Some(values) = map.get("enum") {
        let values = values
            .as_array()
            .ok_or_else(|| SchemaError::integrity(format!("{}/enum", path), "'enum' must be an array"))?;
        return Ok(Some(EnumNode {
            values: values
                .iter()
                .map(|v| EnumValue {
                    value: v.clone(),
                    description: None,
                })
                .collect(),
        }));
    }

    if let Some(value) = map.get("const") {
        return Ok(Some(EnumNode {
            values: vec![EnumValue {
                value: value.clone(),
                description: None,
            }],
        }));
    }

    for keyword in ["oneOf", "anyOf"] {
        let Some(JsonValue::Array(branches)) = map.get(keyword) else {
            continue;
        };
        let consts: Option<Vec<EnumValue>> = branches
            .iter()
            .map(|branch| {
                let branch = branch.as_object()?;
                let value = branch.get("const")?.clone();
                let description = branch
                    .get("description")
                    .or_else(|| branch.get("title"))
                    .and_then(|d| d.as_str())
                    .map(String::from);
                Some(EnumValue { value, description })
            })
            .collect();
        if let Some(values) = consts.filter(|v| !v.is_empty()) {
            return Ok(Some(EnumNode { values }));
        }
    }

    Ok(None)
}

fn parse_object(map: &Map<String, JsonValue>, path: &str) -> Result<ObjectNode, SchemaError> {
    let required: Vec<&str> = match map.get("required") {
        None => Vec::new(),
        Some(JsonValue::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str().ok_or_else(|| {
                    SchemaError::integrity(format!("{}/required", path), "required entries must be strings")
                })
            })
            .collect::<Result<_, _>>()?,
        Some(_) => {
            return Err(SchemaError::integrity(
                format!("{}/required", path),
                "'required' must be an array",
            ))
        }
    };

    let properties = match map.get("properties") {
        None => Vec::new(),
        Some(JsonValue::Object(props)) => props
            .iter()
            .map(|(name, schema)| {
                let node = SchemaNode::from_json(schema, &format!("{}/properties/{}", path, name))?;
                Ok(Property {
                    name: name.clone(),
                    required: required.contains(&name.as_str()),
                    node,
                })
            })
            .collect::<Result<_, SchemaError>>()?,
        Some(_) => {
            return Err(SchemaError::integrity(
                format!("{}/properties", path),
                "'properties' must be an object",
            ))
        }
    };

    Ok(ObjectNode { properties })
}

fn parse_array(map: &Map<String, JsonValue>, path: &str) -> Result<ArrayNode, SchemaError> {
    let items = match map.get("items") {
        Some(schema @ (JsonValue::Object(_) | JsonValue::Bool(_))) => {
            SchemaNode::from_json(schema, &format!("{}/items", path))?
        }
        Some(_) => {
            return Err(SchemaError::integrity(
                format!("{}/items", path),
                "'items' must be a schema",
            ))
        }
        None => SchemaNode::any(),
    };

    Ok(ArrayNode {
        items: Box::new(items),
        min_items: usize_keyword(map, "minItems", path)?,
        max_items: usize_keyword(map, "maxItems", path)?,
    })
}

fn parse_scalar(map: &Map<String, JsonValue>, path: &str) -> Result<ScalarNode, SchemaError> {
    let pattern = match map.get("pattern") {
        None => None,
        Some(JsonValue::String(p)) => Some(p.clone()),
        Some(_) => {
            return Err(SchemaError::integrity(
                format!("{}/pattern", path),
                "'pattern' must be a string",
            ))
        }
    };

    Ok(ScalarNode {
        pattern,
        format: map.get("format").and_then(|f| f.as_str()).map(String::from),
        minimum: bound(map, "minimum", "exclusiveMinimum", path)?,
        maximum: bound(map, "maximum", "exclusiveMaximum", path)?,
        min_length: usize_keyword(map, "minLength", path)?,
        max_length: usize_keyword(map, "maxLength", path)?,
    })
}

fn usize_keyword(map: &Map<String, JsonValue>, key: &str, path: &str) -> Result<Option<usize>, SchemaError> {
    match map.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                SchemaError::integrity(
                    format!("{}/{}", path, key),
                    format!("'{}' must be a non-negative integer", key),
                )
            }),
    }
}

/// The tighter of an inclusive and an exclusive bound, when both are given
fn bound(
    map: &Map<String, JsonValue>,
    inclusive: &str,
    exclusive: &str,
    path: &str,
) -> Result<Option<Bound>, SchemaError> {
    let number = |key: &str| -> Result<Option<f64>, SchemaError> {
        match map.get(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                SchemaError::integrity(format!("{}/{}", path, key), format!("'{}' must be a number", key))
            }),
        }
    };
    let lower = inclusive == "minimum";

    Ok(match (number(inclusive)?, number(exclusive)?) {
        (None, None) => None,
        (Some(v), None) => Some(Bound { value: v, exclusive: false }),
        (None, Some(v)) => Some(Bound { value: v, exclusive: true }),
        (Some(inc), Some(exc)) => {
            let exclusive_is_tighter = if lower { exc >= inc } else { exc <= inc };
            if exclusive_is_tighter {
                Some(Bound { value: exc, exclusive: true })
            } else {
                Some(Bound { value: inc, exclusive: false })
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: JsonValue) -> SchemaNode {
        SchemaNode::from_json(&value, "#").unwrap()
    }

    #[test]
    fn test_object_properties_keep_declaration_order() {
        let n = node(json!({
            "type": "object",
            "properties": {
                "zeta": {"type": "string"},
                "alpha": {"type": "integer"}
            },
            "required": ["alpha"]
        }));
        let NodeKind::Object(obj) = n.kind else {
            panic!("expected object node");
        };
        let names: Vec<&str> = obj.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
        assert!(!obj.properties[0].required);
        assert!(obj.properties[1].required);
    }

    #[test]
    fn test_one_of_consts_become_enum_with_descriptions() {
        let n = node(json!({
            "oneOf": [
                {"const": "local", "description": "small"},
                {"const": "landscape", "title": "medium"}
            ]
        }));
        let NodeKind::Enum(e) = n.kind else {
            panic!("expected enum node");
        };
        assert_eq!(e.labels(), vec!["local", "landscape"]);
        assert_eq!(e.values[0].description.as_deref(), Some("small"));
        assert_eq!(e.values[1].description.as_deref(), Some("medium"));
    }

    #[test]
    fn test_all_of_is_merged_into_parent() {
        let n = node(json!({
            "description": "parent wins",
            "allOf": [{"type": "string", "enum": ["a", "b"], "description": "member"}]
        }));
        assert_eq!(n.description.as_deref(), Some("parent wins"));
        assert_eq!(n.types, vec![JsonType::String]);
        assert!(matches!(n.kind, NodeKind::Enum(_)));
    }

    #[test]
    fn test_nullable_types() {
        let n = node(json!({"type": ["string", "null"]}));
        assert!(n.allows_null());
        assert_eq!(n.type_label(), "string");
        let e = node(json!({"enum": ["low", null]}));
        assert!(e.allows_null());
    }

    #[test]
    fn test_array_of_enum() {
        let n = node(json!({"type": "array", "items": {"enum": ["x"]}, "minItems": 1}));
        let NodeKind::Array(a) = &n.kind else {
            panic!("expected array node");
        };
        assert_eq!(a.min_items, Some(1));
        assert!(matches!(a.items.kind, NodeKind::Enum(_)));
        assert_eq!(n.type_label(), "enum[]");
    }

    #[test]
    fn test_bounds() {
        let n = node(json!({"type": "integer", "minimum": 1, "exclusiveMinimum": 5, "maximum": 10}));
        let NodeKind::Scalar(s) = n.kind else {
            panic!("expected scalar node");
        };
        assert_eq!(s.minimum, Some(Bound { value: 5.0, exclusive: true }));
        assert_eq!(s.maximum, Some(Bound { value: 10.0, exclusive: false }));
    }

    #[test]
    fn test_unknown_type_is_integrity_error() {
        let err = SchemaNode::from_json(&json!({"type": "strng"}), "#/properties/x").unwrap_err();
        match err {
            SchemaError::Integrity { path, reason } => {
                assert_eq!(path, "#/properties/x/type");
                assert!(reason.contains("strng"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_enum_must_be_array() {
        let err = SchemaNode::from_json(&json!({"enum": "a"}), "#").unwrap_err();
        assert!(matches!(err, SchemaError::Integrity { .. }));
    }

    #[test]
    fn test_empty_schema_is_any() {
        assert_eq!(node(json!({})).kind, NodeKind::Any);
        assert_eq!(node(json!(true)).kind, NodeKind::Any);
    }
}
