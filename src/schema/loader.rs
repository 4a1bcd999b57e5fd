//! Schema loading and `$ref` dereferencing
//!
//! [`load_schema`] reads a schema document from the bundled set, a file or
//! a URL, inlines every `$ref` (internal JSON pointers and references to
//! other documents, resolved relative to the referring document), checks
//! the result against the JSON Schema meta-schema and builds the
//! [`Schema`] tree. Nothing is read after this point.

use rust_embed::Embed;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::diagnostics::{ResolutionFailure, SchemaError, SchemaSyntaxError};
use super::node::{NodeKind, ObjectNode, Property, SchemaNode};

/// Schemas shipped with the crate
#[derive(Embed)]
#[folder = "schemas/"]
struct EmbeddedSchemas;

/// Entry document of the bundled RSDB schema
pub const BUNDLED_SCHEMA: &str = "case_study_schema.json";

/// Where to load a schema from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchemaSource {
    /// The RSDB case-study schema embedded in the binary
    #[default]
    Bundled,
    Path(PathBuf),
    Url(String),
}

impl SchemaSource {
    /// `bundled`, an `http(s)://` or `file://` URL, or a path
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("bundled") {
            SchemaSource::Bundled
        } else if trimmed.contains("://") {
            SchemaSource::Url(trimmed.to_string())
        } else {
            SchemaSource::Path(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Bundled => write!(f, "bundled:{}", BUNDLED_SCHEMA),
            SchemaSource::Path(p) => write!(f, "{}", p.display()),
            SchemaSource::Url(u) => f.write_str(u),
        }
    }
}

/// A fully resolved, immutable schema
#[derive(Debug, Clone)]
pub struct Schema {
    source: String,
    title: Option<String>,
    description: Option<String>,
    root: ObjectNode,
    document: JsonValue,
}

impl Schema {
    /// Build a schema from an in-memory document that has no external references
    pub fn from_value(document: JsonValue) -> Result<Self, SchemaError> {
        let mut resolver = Resolver::default();
        let base = DocumentId::Inline;
        resolver.documents.insert(base.clone(), document.clone());
        let resolved = resolver.resolve(&document, &base, &mut Vec::new())?;
        Self::from_resolved("<inline>".to_string(), resolved)
    }

    fn from_resolved(source: String, document: JsonValue) -> Result<Self, SchemaError> {
        match jsonschema::meta::try_validate(&document) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(SchemaError::integrity(
                    format!("#{}", err.instance_path),
                    format!("not a valid JSON Schema: {}", err),
                ))
            }
            Err(err) => {
                return Err(SchemaError::integrity(
                    "#/$schema",
                    format!("unsupported meta-schema: {}", err),
                ))
            }
        }

        let node = SchemaNode::from_json(&document, "#")?;
        let NodeKind::Object(root) = node.kind else {
            return Err(SchemaError::integrity(
                "#",
                "the root schema must describe an object with 'properties'",
            ));
        };
        if root.properties.is_empty() {
            return Err(SchemaError::integrity("#", "the root schema declares no properties"));
        }

        debug!(source = %source, fields = root.properties.len(), "schema resolved");
        Ok(Schema {
            source,
            title: node.title,
            description: node.description,
            root,
            document,
        })
    }

    /// Top-level fields in declaration order
    pub fn fields(&self) -> &[Property] {
        &self.root.properties
    }

    pub fn field(&self, name: &str) -> Option<&Property> {
        self.root.property(name)
    }

    pub fn root(&self) -> &ObjectNode {
        &self.root
    }

    /// The dereferenced schema document
    pub fn document(&self) -> &JsonValue {
        &self.document
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Load and fully resolve a schema
pub fn load_schema(source: &SchemaSource) -> Result<Schema, SchemaError> {
    let entry = match source {
        SchemaSource::Bundled => DocumentId::Bundled(BUNDLED_SCHEMA.to_string()),
        SchemaSource::Path(path) => DocumentId::File(path.clone()),
        SchemaSource::Url(url) => DocumentId::from_url(url).map_err(|reason| SchemaError::Load {
            location: url.clone(),
            reason,
        })?,
    };
    debug!(source = %source, "loading schema");

    let mut resolver = Resolver::default();
    let document = resolver.document(&entry)?.clone();
    let resolved = resolver.resolve(&document, &entry, &mut Vec::new())?;
    Schema::from_resolved(source.to_string(), resolved)
}

/// Identity of one schema document, used as the base for relative references
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DocumentId {
    /// A document handed over in memory; it has no location to resolve against
    Inline,
    Bundled(String),
    File(PathBuf),
    Url(reqwest::Url),
}

impl DocumentId {
    fn from_url(url: &str) -> Result<Self, String> {
        let parsed = reqwest::Url::parse(url).map_err(|e| format!("invalid URL: {}", e))?;
        if parsed.scheme() == "file" {
            return parsed
                .to_file_path()
                .map(DocumentId::File)
                .map_err(|_| format!("invalid file URL: {}", url));
        }
        Ok(DocumentId::Url(parsed))
    }

    /// Resolve a reference path against this document
    fn join(&self, reference: &str) -> Result<DocumentId, String> {
        if reference.contains("://") {
            return DocumentId::from_url(reference);
        }
        match self {
            DocumentId::Inline => Err(format!(
                "'{}' is relative, but an inline schema has no base location",
                reference
            )),
            DocumentId::Bundled(name) => {
                let parent = Path::new(name).parent().unwrap_or(Path::new(""));
                let joined = normalize(&parent.join(reference))
                    .ok_or_else(|| format!("'{}' escapes the bundled schema folder", reference))?;
                Ok(DocumentId::Bundled(joined.to_string_lossy().replace('\\', "/")))
            }
            DocumentId::File(path) => {
                let parent = path.parent().unwrap_or(Path::new(""));
                Ok(DocumentId::File(parent.join(reference)))
            }
            DocumentId::Url(url) => url
                .join(reference)
                .map(DocumentId::Url)
                .map_err(|e| format!("invalid relative URL: {}", e)),
        }
    }

    fn is_yaml(&self) -> bool {
        let name = match self {
            DocumentId::Inline => return false,
            DocumentId::Bundled(name) => name.to_lowercase(),
            DocumentId::File(path) => path.to_string_lossy().to_lowercase(),
            DocumentId::Url(url) => url.path().to_lowercase(),
        };
        name.ends_with(".yaml") || name.ends_with(".yml")
    }

    fn read(&self) -> Result<String, String> {
        match self {
            DocumentId::Inline => Err("an inline schema cannot be re-read".to_string()),
            DocumentId::Bundled(name) => {
                let file = EmbeddedSchemas::get(name)
                    .ok_or_else(|| "no such bundled schema".to_string())?;
                String::from_utf8(file.data.into_owned()).map_err(|e| e.to_string())
            }
            DocumentId::File(path) => std::fs::read_to_string(path).map_err(|e| e.to_string()),
            DocumentId::Url(url) => reqwest::blocking::get(url.clone())
                .and_then(|response| response.error_for_status())
                .and_then(|response| response.text())
                .map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Inline => f.write_str("<inline>"),
            DocumentId::Bundled(name) => write!(f, "bundled:{}", name),
            DocumentId::File(path) => write!(f, "{}", path.display()),
            DocumentId::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Collapse `.` and `..` segments without touching the filesystem
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

/// Keywords dropped from the resolved output: they only exist to be referenced
const DEFINITION_KEYWORDS: &[&str] = &["$defs", "definitions"];

/// Keywords that identify a document and lose meaning once it is inlined
const DOCUMENT_KEYWORDS: &[&str] = &["$schema", "$id"];

#[derive(Default)]
struct Resolver {
    documents: HashMap<DocumentId, JsonValue>,
}

impl Resolver {
    /// Fetch and parse a document, caching it by identity
    fn document(&mut self, id: &DocumentId) -> Result<&JsonValue, SchemaError> {
        if !self.documents.contains_key(id) {
            let text = id.read().map_err(|reason| SchemaError::Load {
                location: id.to_string(),
                reason,
            })?;
            let value = parse_document(id, &text)?;
            debug!(document = %id, "schema document read");
            self.documents.insert(id.clone(), value);
        }
        // inserted above when absent
        Ok(&self.documents[id])
    }

    /// Return a copy of `value` with every `$ref` inlined
    fn resolve(
        &mut self,
        value: &JsonValue,
        base: &DocumentId,
        stack: &mut Vec<String>,
    ) -> Result<JsonValue, SchemaError> {
        match value {
            JsonValue::Object(map) => {
                if let Some(reference) = map.get("$ref") {
                    return self.resolve_reference(map, reference, base, stack);
                }
                let mut out = Map::new();
                for (key, child) in map {
                    if DEFINITION_KEYWORDS.contains(&key.as_str()) {
                        continue;
                    }
                    out.insert(key.clone(), self.resolve(child, base, stack)?);
                }
                Ok(JsonValue::Object(out))
            }
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.resolve(item, base, stack))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve_reference(
        &mut self,
        map: &Map<String, JsonValue>,
        reference: &JsonValue,
        base: &DocumentId,
        stack: &mut Vec<String>,
    ) -> Result<JsonValue, SchemaError> {
        let fail = |reference: &str, failure: ResolutionFailure| SchemaError::Resolution {
            reference: reference.to_string(),
            location: base.to_string(),
            failure,
        };

        let reference = reference
            .as_str()
            .ok_or_else(|| fail(&reference.to_string(), ResolutionFailure::Invalid("'$ref' must be a string".to_string())))?;
        let (doc_part, fragment) = match reference.split_once('#') {
            Some((doc, frag)) => (doc, frag),
            None => (reference, ""),
        };
        if !fragment.is_empty() && !fragment.starts_with('/') {
            return Err(fail(reference, ResolutionFailure::UnsupportedFragment));
        }

        let target_doc = if doc_part.is_empty() {
            base.clone()
        } else {
            base.join(doc_part)
                .map_err(|reason| fail(reference, ResolutionFailure::Invalid(reason)))?
        };

        let key = format!("{}#{}", target_doc, fragment);
        if stack.contains(&key) {
            let mut chain = stack.clone();
            chain.push(key);
            return Err(fail(reference, ResolutionFailure::Cyclic { chain }));
        }

        let document = match self.document(&target_doc) {
            Ok(doc) => doc,
            Err(SchemaError::Load { .. }) => return Err(fail(reference, ResolutionFailure::Dangling)),
            Err(other) => return Err(other),
        };
        let target = document
            .pointer(fragment)
            .cloned()
            .ok_or_else(|| fail(reference, ResolutionFailure::Dangling))?;

        stack.push(key);
        let resolved = self.resolve(&target, &target_doc, stack);
        stack.pop();
        let mut resolved = resolved?;

        if target_doc != *base {
            if let JsonValue::Object(inlined) = &mut resolved {
                for keyword in DOCUMENT_KEYWORDS {
                    inlined.remove(*keyword);
                }
            }
        }

        // keywords next to `$ref` apply on top of the referenced schema
        let mut siblings = Map::new();
        for (key, child) in map {
            if key == "$ref" || DEFINITION_KEYWORDS.contains(&key.as_str()) {
                continue;
            }
            siblings.insert(key.clone(), self.resolve(child, base, stack)?);
        }
        if siblings.is_empty() {
            return Ok(resolved);
        }
        match resolved {
            JsonValue::Object(mut inlined) => {
                for (key, child) in siblings {
                    inlined.insert(key, child);
                }
                Ok(JsonValue::Object(inlined))
            }
            // `true`/`false` schemas: keep the siblings only
            _ => Ok(JsonValue::Object(siblings)),
        }
    }
}

fn parse_document(id: &DocumentId, text: &str) -> Result<JsonValue, SchemaError> {
    let name = id.to_string();
    if id.is_yaml() {
        serde_yml::from_str::<JsonValue>(text)
            .map_err(|e| SchemaError::from(Box::new(SchemaSyntaxError::from_yaml_error(&e, text, &name))))
    } else {
        serde_json::from_str::<JsonValue>(text)
            .map_err(|e| SchemaError::from(Box::new(SchemaSyntaxError::from_json_error(&e, text, &name))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: &JsonValue) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_source_parse() {
        assert_eq!(SchemaSource::parse("bundled"), SchemaSource::Bundled);
        assert_eq!(SchemaSource::parse(""), SchemaSource::Bundled);
        assert_eq!(
            SchemaSource::parse("https://example.org/s.json"),
            SchemaSource::Url("https://example.org/s.json".to_string())
        );
        assert_eq!(
            SchemaSource::parse("schemas/s.json"),
            SchemaSource::Path(PathBuf::from("schemas/s.json"))
        );
    }

    #[test]
    fn test_bundled_schema_loads_without_references() {
        let schema = load_schema(&SchemaSource::Bundled).unwrap();
        assert_eq!(schema.title(), Some("Regime Shift Case Study"));
        assert_eq!(schema.fields()[0].name, "case_study_name");
        assert!(!schema.document().to_string().contains("$ref"));
        assert!(!schema.document().to_string().contains("$defs"));

        let contributors = schema.field("main_contributors").unwrap();
        assert!(contributors.required);
        let NodeKind::Array(array) = &contributors.node.kind else {
            panic!("main_contributors should be an array");
        };
        assert!(matches!(array.items.kind, NodeKind::Object(_)));
    }

    #[test]
    fn test_ref_siblings_override_target() {
        let schema = load_schema(&SchemaSource::Bundled).unwrap();
        let scale = schema.field("spatial_scale").unwrap();
        assert_eq!(
            scale.node.description.as_deref(),
            Some("Typical spatial scale at which the shift occurs")
        );
        assert!(matches!(scale.node.kind, NodeKind::Enum(_)));
    }

    #[test]
    fn test_external_file_references() {
        let tmp = TempDir::new().unwrap();
        write(
            &tmp,
            "defs/vocab.json",
            &json!({"$defs": {"driver": {"type": "string", "enum": ["climate", "economic"]}}}),
        );
        let root = write(
            &tmp,
            "root.json",
            &json!({
                "type": "object",
                "properties": {
                    "driver_type": {"$ref": "defs/vocab.json#/$defs/driver"}
                },
                "required": ["driver_type"]
            }),
        );
        let schema = load_schema(&SchemaSource::Path(root)).unwrap();
        assert_eq!(
            schema.document()["properties"]["driver_type"]["enum"],
            json!(["climate", "economic"])
        );
    }

    #[test]
    fn test_yaml_schema() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("schema.yaml");
        std::fs::write(
            &path,
            "type: object\nproperties:\n  name:\n    type: string\nrequired: [name]\n",
        )
        .unwrap();
        let schema = load_schema(&SchemaSource::Path(path)).unwrap();
        assert!(schema.field("name").unwrap().required);
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = load_schema(&SchemaSource::Path(PathBuf::from("/nonexistent/schema.json"))).unwrap_err();
        assert!(err.is_load_error(), "unexpected error: {:?}", err);
    }

    #[test]
    fn test_malformed_document_is_syntax_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{\"type\": \"object\",}").unwrap();
        let err = load_schema(&SchemaSource::Path(path)).unwrap_err();
        assert!(matches!(err, SchemaError::Syntax(_)));
        assert!(err.is_load_error());
    }

    #[test]
    fn test_dangling_reference() {
        let err = Schema::from_value(json!({
            "type": "object",
            "properties": {"a": {"$ref": "#/$defs/nope"}}
        }))
        .unwrap_err();
        match err {
            SchemaError::Resolution { failure, reference, .. } => {
                assert_eq!(failure, ResolutionFailure::Dangling);
                assert_eq!(reference, "#/$defs/nope");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_dangling_external_document() {
        let tmp = TempDir::new().unwrap();
        let root = write(
            &tmp,
            "root.json",
            &json!({"type": "object", "properties": {"a": {"$ref": "missing.json"}}}),
        );
        let err = load_schema(&SchemaSource::Path(root)).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Resolution { failure: ResolutionFailure::Dangling, .. }
        ));
    }

    #[test]
    fn test_cyclic_reference() {
        let err = Schema::from_value(json!({
            "type": "object",
            "properties": {"node": {"$ref": "#/$defs/node"}},
            "$defs": {
                "node": {
                    "type": "object",
                    "properties": {"child": {"$ref": "#/$defs/node"}}
                }
            }
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Resolution { failure: ResolutionFailure::Cyclic { .. }, .. }
        ));
    }

    #[test]
    fn test_anchor_fragment_unsupported() {
        let err = Schema::from_value(json!({
            "type": "object",
            "properties": {"a": {"$ref": "#anchor"}}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Resolution { failure: ResolutionFailure::UnsupportedFragment, .. }
        ));
    }

    #[test]
    fn test_meta_schema_violation_is_integrity_error() {
        let err = Schema::from_value(json!({
            "type": "object",
            "properties": {"a": {"minLength": "three"}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Integrity { .. }));
    }

    #[test]
    fn test_root_without_properties_is_integrity_error() {
        let err = Schema::from_value(json!({"type": "string"})).unwrap_err();
        assert!(matches!(err, SchemaError::Integrity { .. }));
    }

    #[test]
    fn test_bundled_escape_rejected() {
        let id = DocumentId::Bundled("case_study_schema.json".to_string());
        assert!(id.join("../outside.json").is_err());
        assert_eq!(
            id.join("defs/./contributor.json").unwrap(),
            DocumentId::Bundled("defs/contributor.json".to_string())
        );
        let nested = DocumentId::Bundled("defs/contributor.json".to_string());
        assert_eq!(
            nested.join("vocabularies.json").unwrap(),
            DocumentId::Bundled("defs/vocabularies.json".to_string())
        );
    }

    #[test]
    fn test_unknown_meta_schema_is_integrity_error() {
        let err = Schema::from_value(json!({
            "$schema": "https://example.org/custom-meta",
            "type": "object",
            "properties": {"a": {"type": "string"}}
        }))
        .unwrap_err();
        match err {
            SchemaError::Integrity { path, .. } => assert_eq!(path, "#/$schema"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_inline_relative_reference_is_invalid() {
        let err = Schema::from_value(json!({
            "type": "object",
            "properties": {"who": {"$ref": "defs/contributor.json"}}
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Resolution { failure: ResolutionFailure::Invalid(_), .. }
        ));
        assert!(DocumentId::Inline.join("https://example.org/s.json").is_ok());
    }
}
