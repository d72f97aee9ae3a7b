//! Command-line interface for ldapexport
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Merging flags over configuration values
//! - Subcommands (version, completion, config)

pub mod completion;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, LogLevel};
use crate::directory::{Filter, QuerySpec, Scope};
use crate::error::{ConfigError, Result};
use crate::export::default_filename;
use crate::ldif::{LineSeparator, ValueEncoding};

/// LDAP export - stream directory search results into LDIF
#[derive(Parser, Debug)]
#[command(
    name = "ldapexport",
    version,
    about = "Export directory search results as LDIF",
    long_about = "Runs one directory search and streams the results into an LDIF file.
Attribute lines are sorted so repeated exports of the same data are identical.
Server-side size, time and administrative limits end the export normally."
)]
pub struct CliArgs {
    /// Directory snapshot to search (JSON)
    #[arg(short = 's', long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Search base DN
    #[arg(short = 'b', long, value_name = "DN")]
    pub base: Option<String>,

    /// Search filter (RFC 4515)
    ///
    /// Example: ldapexport -s dir.json -f '(&(objectClass=person)(mail=*))'
    #[arg(short = 'f', long, value_name = "FILTER")]
    pub filter: Option<String>,

    /// Search scope (base, one, sub)
    #[arg(long, value_name = "SCOPE")]
    pub scope: Option<Scope>,

    /// Time limit in seconds (0 = unlimited)
    #[arg(long, value_name = "SECONDS")]
    pub time_limit: Option<u32>,

    /// Size limit in entries (0 = unlimited)
    #[arg(long, value_name = "COUNT")]
    pub size_limit: Option<u32>,

    /// Attributes to export, comma separated (default: all)
    #[arg(short = 'a', long, value_name = "ATTRS", value_delimiter = ',')]
    pub attributes: Vec<String>,

    /// Output file (default: export-<timestamp>.ldif)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum line length before folding (0 disables folding)
    #[arg(long, value_name = "COLUMNS")]
    pub line_width: Option<usize>,

    /// Base64-encode every attribute value
    #[arg(long)]
    pub force_encoded: bool,

    /// Use CRLF line endings
    #[arg(long)]
    pub crlf: bool,

    /// Write a `version: 1` line at the top of the file
    #[arg(long)]
    pub version_header: bool,

    /// Disable the progress spinner
    #[arg(long)]
    pub no_progress: bool,

    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (minimal output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (debug logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for ldapexport
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Configuration with command-line overrides applied
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build the interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;

        if let Err(e) = config.validate() {
            eprintln!("Warning: Configuration validation failed: {}", e);
            eprintln!("Using default configuration instead.");
            config = Config::default();
        }

        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Get the effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Snapshot to export from; required unless a subcommand runs
    pub fn snapshot_path(&self) -> Result<&Path> {
        self.args.snapshot.as_deref().ok_or_else(|| {
            ConfigError::InvalidValue {
                field: "snapshot".to_string(),
                value: "<missing>".to_string(),
            }
            .into()
        })
    }

    /// Output path from `--output` or a timestamped default
    pub fn output_path(&self) -> PathBuf {
        self.args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_filename()))
    }

    /// The search to run. The filter is parsed up front so a typo fails
    /// before the output file is created.
    pub fn query_spec(&self) -> Result<QuerySpec> {
        Filter::parse(&self.config.query.filter)?;
        Ok(self.config.query_spec())
    }

    /// Whether to draw the progress spinner
    pub fn show_progress(&self) -> bool {
        self.config.export.show_progress && !self.args.quiet
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_query_args(config, args);
        Self::apply_export_args(config, args);
        Self::apply_logging_args(config, args);
    }

    fn apply_query_args(config: &mut Config, args: &CliArgs) {
        let query = &mut config.query;
        if let Some(base) = &args.base {
            query.base = base.clone();
        }
        if let Some(filter) = &args.filter {
            query.filter = filter.clone();
        }
        if let Some(scope) = args.scope {
            query.scope = scope;
        }
        if let Some(limit) = args.time_limit {
            query.time_limit = limit;
        }
        if let Some(limit) = args.size_limit {
            query.size_limit = limit;
        }
        if !args.attributes.is_empty() {
            query.attributes = args.attributes.clone();
        }
    }

    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        let export = &mut config.export;
        if let Some(width) = args.line_width {
            export.line_width = width;
        }
        if args.force_encoded {
            export.value_encoding = ValueEncoding::ForceEncoded;
        }
        if args.crlf {
            export.line_separator = LineSeparator::CrLf;
        }
        if args.version_header {
            export.write_version_header = true;
        }
        if args.no_progress {
            export.show_progress = false;
        }
    }

    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn show_version(&self) {
        println!("ldapexport version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file();
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self) {
        let path = self.get_config_path();
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist");
            return;
        }

        match Config::load_from_file(Some(&path)) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        let path = self.get_config_path();
        println!("Configuration file: {}", path.display());
        println!();
        println!("=== Effective Configuration ===");
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Get configuration file path (from args or default)
    fn get_config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }
}
