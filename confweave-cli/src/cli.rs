//! CLI definition for the confweave command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format for `show`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// INI text that parses back to the same sections
    Ini,
    /// JSON object of sections holding string values
    Json,
    /// JSON with every value parsed into its typed form
    TypedJson,
}

/// confweave - layered configuration composition
///
/// Loads a root configuration, resolves its imports and prints the result.
#[derive(Parser, Debug)]
#[command(name = "confweave")]
#[command(version)]
#[command(about = "Load, inspect and dump merged configurations")]
pub struct Cli {
    /// Enable debug output to stderr
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Root configuration file (.conf, .ini, .yml, .json, ...)
    #[arg(short, long, global = true, default_value = "app.conf")]
    pub config: PathBuf,

    /// Merge a file, directory or `section.option=value` list over the result
    #[arg(short = 'o', long = "override", global = true)]
    pub overrides: Vec<String>,

    /// Cache the merged result here, keyed on source modification times
    #[arg(long, global = true, env = "CONFWEAVE_CACHE")]
    pub cache: Option<PathBuf>,

    /// Drop sections that fail to resolve instead of failing the load
    #[arg(long, global = true)]
    pub robust: bool,

    /// Name of the import control section (or YAML node)
    #[arg(long, global = true, default_value = "import")]
    pub config_section: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the merged configuration
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Ini)]
        format: OutputFormat,
        /// Print only this section
        #[arg(short, long)]
        section: Option<String>,
        /// Print stored templates without resolving references
        #[arg(long)]
        raw: bool,
    },
    /// List section names in order
    Sections,
    /// Print a single option
    Get {
        /// Section holding the option
        section: String,
        /// Option name
        option: String,
        /// Parse the value before printing it
        #[arg(long)]
        typed: bool,
    },
    /// Delete the cache file, if any
    ClearCache,
}
