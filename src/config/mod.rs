//! Configuration management for ldapexport
//!
//! This module handles loading, parsing, and saving the TOML configuration
//! file. Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::directory::{QuerySpec, Scope};
use crate::error::{ConfigError, Result, StatusCode};
use crate::export::BenignStatusCodes;
use crate::ldif::{DEFAULT_LINE_WIDTH, FormatParams, LineSeparator, ValueEncoding};
use crate::ordering::{AttributeOrdering, DefaultAttributeOrdering, SchemaAttributeOrdering};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// LDIF output configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Default search parameters
    #[serde(default)]
    pub query: QueryConfig,

    /// Attribute ordering configuration
    #[serde(default)]
    pub ordering: OrderingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LDIF output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Maximum line length before folding (0 disables folding)
    #[serde(default = "default_line_width")]
    pub line_width: usize,

    /// Value encoding (plain, force-encoded)
    #[serde(default)]
    pub value_encoding: ValueEncoding,

    /// Line separator (lf, crlf)
    #[serde(default)]
    pub line_separator: LineSeparator,

    /// Write `name: value` instead of `name:value`
    #[serde(default = "default_true")]
    pub space_after_colon: bool,

    /// Start the file with a `version: 1` line
    #[serde(default)]
    pub write_version_header: bool,

    /// Show a progress spinner while exporting
    #[serde(default = "default_true")]
    pub show_progress: bool,

    /// Status codes treated like the size/time/admin limits
    #[serde(default)]
    pub extra_benign_codes: Vec<u32>,
}

/// Default search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Search base DN
    #[serde(default)]
    pub base: String,

    /// Search filter (RFC 4515)
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Search scope (base, one, sub)
    #[serde(default)]
    pub scope: Scope,

    /// Time limit in seconds (0 = unlimited)
    #[serde(default)]
    pub time_limit: u32,

    /// Size limit in entries (0 = unlimited)
    #[serde(default = "default_size_limit")]
    pub size_limit: u32,

    /// Attributes to return (empty = all)
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// Attribute ordering configuration
///
/// When `must` or `may` is non-empty the schema-aware ordering is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Attributes written first, in this order
    #[serde(default = "default_leading")]
    pub leading: Vec<String>,

    /// Attributes every exported entry must have
    #[serde(default)]
    pub must: Vec<String>,

    /// Attributes exported entries may have
    #[serde(default)]
    pub may: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_line_width() -> usize {
    DEFAULT_LINE_WIDTH
}

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    "(objectClass=*)".to_string()
}

fn default_size_limit() -> u32 {
    1000
}

fn default_leading() -> Vec<String> {
    vec!["objectClass".to_string()]
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            line_width: default_line_width(),
            value_encoding: ValueEncoding::default(),
            line_separator: LineSeparator::default(),
            space_after_colon: true,
            write_version_header: false,
            show_progress: true,
            extra_benign_codes: Vec::new(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            base: String::new(),
            filter: default_filter(),
            scope: Scope::default(),
            time_limit: 0,
            size_limit: default_size_limit(),
            attributes: Vec::new(),
        }
    }
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            leading: default_leading(),
            must: Vec::new(),
            may: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// With no explicit path the default location is used, and a missing
    /// default file yields the default configuration. An explicit path that
    /// does not exist is an error.
    ///
    /// # Arguments
    /// * `path` - Optional path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - `<config dir>/ldapexport/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ldapexport")
            .join("config.toml")
    }

    /// Save configuration to a file, creating parent directories as needed
    ///
    /// # Arguments
    /// * `path` - Path where to save the configuration
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.export.line_width == 1 {
            return Err(invalid("export.line_width", "1"));
        }
        if self.query.filter.trim().is_empty() {
            return Err(invalid("query.filter", &self.query.filter));
        }
        if let Some(name) = self
            .ordering
            .leading
            .iter()
            .chain(&self.ordering.must)
            .chain(&self.ordering.may)
            .find(|name| name.trim().is_empty())
        {
            return Err(invalid("ordering", name));
        }
        if let Some(code) = self.export.extra_benign_codes.iter().find(|c| **c == 0) {
            return Err(invalid("export.extra_benign_codes", &code.to_string()));
        }
        Ok(())
    }

    /// Formatting options for the LDIF codec
    pub fn format_params(&self) -> FormatParams {
        FormatParams {
            line_width: self.export.line_width,
            value_encoding: self.export.value_encoding,
            line_separator: self.export.line_separator,
            space_after_colon: self.export.space_after_colon,
        }
    }

    /// Default limit codes plus the configured extra codes
    pub fn benign_codes(&self) -> BenignStatusCodes {
        self.export
            .extra_benign_codes
            .iter()
            .fold(BenignStatusCodes::default(), |codes, code| {
                codes.with(StatusCode::from_code(*code))
            })
    }

    /// Build the attribute ordering described by `[ordering]`
    pub fn attribute_ordering(&self) -> Arc<dyn AttributeOrdering> {
        let ordering = &self.ordering;
        if ordering.must.is_empty() && ordering.may.is_empty() {
            Arc::new(DefaultAttributeOrdering::new(ordering.leading.clone()))
        } else {
            Arc::new(SchemaAttributeOrdering::new(
                ordering.leading.clone(),
                ordering.must.clone(),
                ordering.may.clone(),
            ))
        }
    }

    /// Search parameters from `[query]`
    pub fn query_spec(&self) -> QuerySpec {
        let query = &self.query;
        QuerySpec::new(query.base.clone(), query.filter.clone(), query.scope)
            .with_time_limit(query.time_limit)
            .with_size_limit(query.size_limit)
            .with_attributes(query.attributes.clone())
    }
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportError;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.line_width, 76);
        assert_eq!(config.export.value_encoding, ValueEncoding::Plain);
        assert!(!config.export.write_version_header);
        assert_eq!(config.query.filter, "(objectClass=*)");
        assert_eq!(config.query.size_limit, 1000);
        assert_eq!(config.ordering.leading, vec!["objectClass"]);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [export]
            line_width = 0
            value_encoding = "force-encoded"
            line_separator = "crlf"

            [query]
            base = "ou=People,dc=example,dc=com"
            scope = "one"
            "#,
        )
        .unwrap();

        assert_eq!(config.export.line_width, 0);
        assert_eq!(config.export.value_encoding, ValueEncoding::ForceEncoded);
        assert_eq!(config.export.line_separator, LineSeparator::CrLf);
        assert!(config.export.space_after_colon);
        assert_eq!(config.query.scope, Scope::OneLevel);
        assert_eq!(config.query.size_limit, 1000);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[export]\nline_width = \"wide\"").unwrap_err();
        assert!(matches!(err, ExportError::Config(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.query.base = "dc=example,dc=com".to_string();
        config.export.extra_benign_codes = vec![9];
        config.ordering.must = vec!["cn".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load_from_file(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load_from_file(Some(Path::new("/nonexistent/config.toml"))).unwrap_err();
        assert!(matches!(err, ExportError::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.export.line_width = 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.query.filter = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.export.extra_benign_codes = vec![0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_benign_codes() {
        let mut config = Config::default();
        config.export.extra_benign_codes = vec![9];
        let codes = config.benign_codes();
        assert!(codes.contains(StatusCode::SizeLimitExceeded));
        assert!(codes.contains(StatusCode::Unknown(9)));
        assert!(!codes.contains(StatusCode::Busy));
    }

    #[test]
    fn test_query_spec_and_format_params() {
        let mut config = Config::default();
        config.query.base = "dc=example,dc=com".to_string();
        config.query.time_limit = 30;
        config.export.space_after_colon = false;

        let query = config.query_spec();
        assert_eq!(query.base, "dc=example,dc=com");
        assert_eq!(query.scope, Scope::Subtree);
        assert_eq!(query.time_limit, 30);
        assert_eq!(query.size_limit, 1000);

        let params = config.format_params();
        assert_eq!(params.line_width, 76);
        assert!(!params.space_after_colon);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
    }
}
