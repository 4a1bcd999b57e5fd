//! CLI command implementations

pub mod check;
pub mod completions;
pub mod convert;
pub mod enums;
pub mod schema;
