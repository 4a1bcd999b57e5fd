//! Schema system - loading, `$ref` resolution and record validation

pub mod diagnostics;
pub mod loader;
pub mod node;
pub mod validator;

pub use diagnostics::{ResolutionFailure, SchemaError, SchemaSyntaxError};
pub use loader::{load_schema, Schema, SchemaSource, BUNDLED_SCHEMA};
pub use node::{
    ArrayNode, Bound, EnumNode, EnumValue, JsonType, NodeKind, ObjectNode, Property, ScalarNode,
    SchemaNode,
};
pub use validator::{validate, ValidationResult, Validator, Violation, ViolationKind};
