//! Schema errors with source-located diagnostics

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fmt;
use thiserror::Error;

/// Syntax error in a schema document, pointing at the offending location
#[derive(Debug, Error, Diagnostic)]
#[error("Schema syntax error: {message}")]
#[diagnostic(code(rsdb::schema::syntax))]
pub struct SchemaSyntaxError {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    #[help]
    help: Option<String>,

    /// The underlying parser message
    message: String,
}

impl SchemaSyntaxError {
    /// Create a syntax error from a serde_json error
    pub fn from_json_error(err: &serde_json::Error, source: &str, name: &str) -> Self {
        Self::at_location(err.to_string(), source, name, err.line(), err.column())
    }

    /// Create a syntax error from a serde_yml error
    pub fn from_yaml_error(err: &serde_yml::Error, source: &str, name: &str) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));
        Self::at_location(err.to_string(), source, name, line, column)
    }

    fn at_location(message: String, source: &str, name: &str, line: usize, column: usize) -> Self {
        let offset = line_col_to_offset(source, line.max(1), column.max(1));
        let help = generate_help(&message);

        Self {
            src: NamedSource::new(name, source.to_string()),
            span: SourceSpan::from(offset..offset.saturating_add(1)),
            help,
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a `$ref` could not be dereferenced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    /// The target document or pointer does not exist
    Dangling,
    /// The reference leads back to itself
    Cyclic { chain: Vec<String> },
    /// Anchor fragments (`#name`) are not supported
    UnsupportedFragment,
    /// The `$ref` value is not a usable reference
    Invalid(String),
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::Dangling => f.write_str("target does not exist"),
            ResolutionFailure::Cyclic { chain } => {
                write!(f, "cyclic reference: {}", chain.join(" -> "))
            }
            ResolutionFailure::UnsupportedFragment => {
                f.write_str("only JSON pointer fragments ('#/...') are supported")
            }
            ResolutionFailure::Invalid(reason) => f.write_str(reason),
        }
    }
}

/// Errors raised while loading, resolving or interpreting a schema
#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    /// The schema source is unreachable or unreadable
    #[error("Cannot load schema '{location}': {reason}")]
    #[diagnostic(
        code(rsdb::schema::load),
        help("Check the --schema value, the RSDB_SCHEMA variable or the `schema` key in rsdb.yaml")
    )]
    Load { location: String, reason: String },

    /// The schema source is not valid JSON or YAML
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(#[from] Box<SchemaSyntaxError>),

    /// A `$ref` could not be dereferenced
    #[error("Cannot resolve reference '{reference}' in '{location}': {failure}")]
    #[diagnostic(code(rsdb::schema::resolution))]
    Resolution {
        reference: String,
        location: String,
        failure: ResolutionFailure,
    },

    /// The schema is structurally unusable
    #[error("Schema is not usable at '{path}': {reason}")]
    #[diagnostic(code(rsdb::schema::integrity))]
    Integrity { path: String, reason: String },
}

impl SchemaError {
    pub fn integrity(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::Integrity {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for errors meaning the source could not be read or parsed
    pub fn is_load_error(&self) -> bool {
        matches!(self, SchemaError::Load { .. } | SchemaError::Syntax(_))
    }
}

/// Convert line/column to byte offset
fn line_col_to_offset(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    let mut current_line = 1;

    for (i, ch) in source.char_indices() {
        if current_line == line {
            let line_start = i;
            let mut col = 1;
            for (j, c) in source[line_start..].char_indices() {
                if col == column {
                    return line_start + j;
                }
                if c == '\n' {
                    break;
                }
                col += 1;
            }
            return line_start + column.saturating_sub(1);
        }
        if ch == '\n' {
            current_line += 1;
        }
        offset = i;
    }

    offset
}

/// Generate helpful suggestions based on the parser message
fn generate_help(message: &str) -> Option<String> {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("trailing comma") {
        return Some("JSON does not allow a comma after the last item of an object or array".to_string());
    }

    if msg_lower.contains("expected `,` or `}`") || msg_lower.contains("expected `,` or `]`") {
        return Some("Add a comma between members, or close the object/array".to_string());
    }

    if msg_lower.contains("key must be a string") {
        return Some("Object keys must be double-quoted strings: {\"type\": \"string\"}".to_string());
    }

    if msg_lower.contains("eof while parsing") {
        return Some("The document ends early - check for an unclosed brace or bracket".to_string());
    }

    if msg_lower.contains("tab") {
        return Some(
            "YAML requires spaces for indentation, not tabs. Replace tabs with spaces.".to_string(),
        );
    }

    if msg_lower.contains("duplicate key") {
        return Some("Each key can only appear once. Remove or rename the duplicate key.".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col_to_offset() {
        let source = "line1\nline2\nline3";
        assert_eq!(line_col_to_offset(source, 1, 1), 0);
        assert_eq!(line_col_to_offset(source, 2, 1), 6);
        assert_eq!(line_col_to_offset(source, 3, 1), 12);
    }

    #[test]
    fn test_help_generation() {
        assert!(generate_help("trailing comma at line 3 column 1").is_some());
        assert!(generate_help("EOF while parsing an object").is_some());
        assert!(generate_help("found tab character").is_some());
        assert!(generate_help("some random error").is_none());
    }

    #[test]
    fn test_syntax_error_from_json() {
        let source = "{\n  \"type\": \"object\",\n}";
        let err = serde_json::from_str::<serde_json::Value>(source).unwrap_err();
        let syntax = SchemaSyntaxError::from_json_error(&err, source, "broken.json");
        assert!(syntax.message().contains("trailing comma"));
        assert!(syntax.help.is_some());
    }

    #[test]
    fn test_cyclic_failure_display() {
        let failure = ResolutionFailure::Cyclic {
            chain: vec!["a.json#/x".to_string(), "a.json#/y".to_string()],
        };
        assert_eq!(failure.to_string(), "cyclic reference: a.json#/x -> a.json#/y");
    }
}
