//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::report::ReportColumns;
use crate::schema::SchemaSource;

/// Name of the per-directory configuration file
pub const PROJECT_CONFIG_FILE: &str = "rsdb.yaml";

/// Delimiter separating the elements of list-valued fields stored as plain text
pub const DEFAULT_LIST_DELIMITER: char = ';';

/// RSDB configuration with layered hierarchy
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema source: `bundled`, a path, or a URL
    pub schema: Option<String>,

    /// Delimiter for list-valued fields stored as plain text
    pub list_delimiter: Option<char>,

    /// Name of the column receiving the violation messages
    pub error_column: Option<String>,

    /// Name of the column receiving the violation count
    pub count_column: Option<String>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load() -> Self {
        let mut config = Config::default();

        // 1. Global user config (~/.config/rsdb/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 2. Working directory config (./rsdb.yaml)
        if let Some(local) = Self::read_file(Path::new(PROJECT_CONFIG_FILE)) {
            config.merge(local);
        }

        // 3. Environment variables
        config.merge(Self::from_env());

        config
    }

    /// Read one config file; a missing file is not an error, a broken one is logged and skipped
    pub fn read_file(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), "cannot read config file: {}", e);
                return None;
            }
        };
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded config file");
                Some(config)
            }
            Err(e) => {
                warn!(path = %path.display(), "ignoring invalid config file: {}", e);
                None
            }
        }
    }

    fn from_env() -> Config {
        Config {
            schema: std::env::var("RSDB_SCHEMA").ok(),
            list_delimiter: std::env::var("RSDB_LIST_DELIMITER")
                .ok()
                .and_then(|s| s.chars().next()),
            error_column: None,
            count_column: None,
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rsdb")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: Config) {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.list_delimiter.is_some() {
            self.list_delimiter = other.list_delimiter;
        }
        if other.error_column.is_some() {
            self.error_column = other.error_column;
        }
        if other.count_column.is_some() {
            self.count_column = other.count_column;
        }
    }

    /// Schema source, defaulting to the bundled RSDB schema
    pub fn schema_source(&self) -> SchemaSource {
        self.schema
            .as_deref()
            .map(SchemaSource::parse)
            .unwrap_or_default()
    }

    pub fn list_delimiter(&self) -> char {
        self.list_delimiter.unwrap_or(DEFAULT_LIST_DELIMITER)
    }

    /// Names of the diagnostic columns added by `check`
    pub fn report_columns(&self) -> ReportColumns {
        let defaults = ReportColumns::default();
        ReportColumns {
            errors: self.error_column.clone().unwrap_or(defaults.errors),
            count: self.count_column.clone().unwrap_or(defaults.count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_prefers_other() {
        let mut base = Config {
            schema: Some("a.json".to_string()),
            list_delimiter: Some('|'),
            ..Default::default()
        };
        base.merge(Config {
            schema: Some("b.json".to_string()),
            ..Default::default()
        });
        assert_eq!(base.schema.as_deref(), Some("b.json"));
        assert_eq!(base.list_delimiter(), '|');
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.list_delimiter(), ';');
        assert_eq!(config.schema_source(), SchemaSource::Bundled);
        let columns = config.report_columns();
        assert_eq!(columns.errors, "schema_errors");
        assert_eq!(columns.count, "nb_schema_errors");
    }

    #[test]
    fn test_read_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rsdb.yaml");
        std::fs::write(&path, "schema: my_schema.json\nlist_delimiter: \"|\"\nerror_column: errors\n")
            .unwrap();
        let config = Config::read_file(&path).unwrap();
        assert_eq!(config.schema.as_deref(), Some("my_schema.json"));
        assert_eq!(config.list_delimiter(), '|');
        assert_eq!(config.report_columns().errors, "errors");
        assert_eq!(config.report_columns().count, "nb_schema_errors");
    }

    #[test]
    fn test_read_file_invalid_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rsdb.yaml");
        std::fs::write(&path, "list_delimiter: [not, a, char]\n").unwrap();
        assert!(Config::read_file(&path).is_none());
        assert!(Config::read_file(&tmp.path().join("absent.yaml")).is_none());
    }
}
