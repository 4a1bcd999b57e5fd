//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use miette::Result;
use tracing::debug;

use crate::cli::GlobalOpts;
use crate::core::Config;
use crate::schema::{load_schema, Schema};

/// Load the layered configuration, then apply command-line overrides
pub fn load_config(global: &GlobalOpts) -> Config {
    let mut config = Config::load();
    config.merge(Config {
        schema: global.schema.clone(),
        ..Default::default()
    });
    config
}

/// Load the schema the configuration points at
pub fn load_configured_schema(config: &Config) -> Result<Schema> {
    let source = config.schema_source();
    debug!(source = %source, "using schema");
    Ok(load_schema(&source)?)
}

/// Parse a single-character delimiter argument
pub fn parse_delimiter(s: &str) -> Result<char, String> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("expected a single character, got '{}'", s)),
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("édition spéciale", 7), "édi...");
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(";"), Ok(';'));
        assert_eq!(parse_delimiter("|"), Ok('|'));
        assert!(parse_delimiter("").is_err());
        assert!(parse_delimiter(";;").is_err());
    }
}
