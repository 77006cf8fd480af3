//! Command-line interface for pagezip
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and merging with arguments
//! - Running exports from JSON Lines files
//! - Shell completion generation

pub mod completion;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::export::{DriverRegistry, ExportEngine, ExportOptions, JsonLinesSource, ProgressTracker};
use crate::formatter::{OutputFormat, SummaryFormatter};

/// pagezip - export paginated data into a zip of row-bounded files
#[derive(Parser, Debug)]
#[command(
    name = "pagezip",
    version,
    about = "Export paginated data into a zip of row-bounded files",
    long_about = "Reads records page by page, writes them as CSV, Excel or JSON Lines files of at
most --rotation-threshold rows each, and bundles the files into a single zip archive."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// Quiet mode (no summary output)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for pagezip
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export a JSON Lines file into a zip archive
    Export(ExportArgs),

    /// List available output formats
    Formats,

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

/// Arguments of the `export` subcommand
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// JSON Lines input file
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output zip file (default: <base-name>-<timestamp>.zip)
    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (csv, xlsx, jsonl)
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Prefix of the files inside the archive
    #[arg(short = 'b', long, value_name = "NAME")]
    pub base_name: Option<String>,

    /// Rows fetched per page
    #[arg(long, value_name = "ROWS")]
    pub page_size: Option<usize>,

    /// Maximum rows per file
    #[arg(long, value_name = "ROWS")]
    pub rotation_threshold: Option<usize>,

    /// Number of records to skip
    #[arg(long, value_name = "ROWS")]
    pub offset: Option<u64>,

    /// Object keys to export, in column order
    #[arg(long, value_name = "FIELDS", value_delimiter = ',')]
    pub fields: Option<Vec<String>>,

    /// Show a progress spinner
    #[arg(long)]
    pub progress: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,

    /// Available format drivers
    registry: DriverRegistry,
}

impl CliInterface {
    /// Create a new CLI interface
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let mut config = Config::load(args.config_file.as_deref())?;
        if let Commands::Export(ref export) = args.command {
            Self::apply_args_to_config(&mut config, export);
        }

        Ok(Self {
            args,
            config,
            registry: DriverRegistry::builtin(),
        })
    }

    /// Apply export arguments on top of the configuration file values
    fn apply_args_to_config(config: &mut Config, args: &ExportArgs) {
        if let Some(ref format) = args.format {
            config.export.format = format.clone();
        }
        if let Some(ref base_name) = args.base_name {
            config.export.base_name = base_name.clone();
        }
        if let Some(page_size) = args.page_size {
            config.export.page_size = page_size;
        }
        if let Some(rotation_threshold) = args.rotation_threshold {
            config.export.rotation_threshold = rotation_threshold;
        }
        if let Some(offset) = args.offset {
            config.export.offset = offset;
        }
        if let Some(ref fields) = args.fields {
            config.export.fields = fields.clone();
        }
    }

    /// Get the parsed arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Get the effective configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the selected subcommand
    ///
    /// # Arguments
    /// * `cancel` - Token cancelled when the user interrupts the process
    pub async fn execute(&self, cancel: CancellationToken) -> Result<()> {
        match &self.args.command {
            Commands::Export(args) => self.run_export(args, &cancel).await,
            Commands::Formats => {
                for name in self.registry.names() {
                    let driver = self.registry.get(name)?;
                    println!("{:<8} {}", name, driver.suffix());
                }
                Ok(())
            }
            Commands::Completion { shell } => {
                completion::generate_completion(shell, &mut std::io::stdout())
            }
            Commands::Config { show, validate } => {
                if *validate {
                    self.config.validate()?;
                    println!("Configuration is valid");
                }
                if *show || !*validate {
                    print!("{}", self.config.to_toml_string()?);
                }
                Ok(())
            }
        }
    }

    async fn run_export(&self, args: &ExportArgs, cancel: &CancellationToken) -> Result<()> {
        let export = &self.config.export;
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&export.base_name));
        validate_output_path(&output)?;

        let options = ExportOptions::from(export);
        let source = JsonLinesSource::open(&args.input, options.fields.clone()).await?;
        let mut engine = ExportEngine::new(
            &self.registry,
            &export.format,
            export.base_name.clone(),
            Box::new(source),
            options,
        )?;
        if args.progress && !self.args.quiet {
            engine = engine.with_progress(ProgressTracker::new(true));
        }

        engine.run(cancel).await?;

        tokio::fs::write(&output, engine.archive_bytes()?).await?;
        info!("Wrote archive to {}", output.display());

        if !self.args.quiet {
            let format = if args.json {
                OutputFormat::Json
            } else {
                OutputFormat::Table
            };
            println!("{}", SummaryFormatter::new(format).format(&engine.summary())?);
            if !args.json {
                println!("Archive: {}", output.display());
            }
        }
        Ok(())
    }
}

/// Default output path: `<base_name>-<timestamp>.zip`
fn default_output_path(base_name: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from(format!("{}-{}.zip", base_name, timestamp))
}

/// Check that the output file can be created in an existing directory
fn validate_output_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidValue {
                field: "output".to_string(),
                value: format!("directory does not exist: {}", parent.display()),
            }
            .into());
        }
    }
    debug!("Output path: {}", path.display());
    Ok(())
}
