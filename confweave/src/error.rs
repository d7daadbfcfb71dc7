//! Error types for the configuration composition engine

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
///
/// Every variant carries the section, option, path or raw value that caused it
/// so a configuration author can find the mistake without a stack trace.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read configuration file
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("Failed to write {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed configuration text
    #[error("Failed to parse {origin} at line {line}: {message}")]
    Parse {
        origin: String,
        line: usize,
        message: String,
    },

    /// A section header occurs twice in one source
    #[error("Section '{section}' already exists in {origin}")]
    DuplicateSection { origin: String, section: String },

    /// An option occurs twice in one section of one source
    #[error("Option '{option}' in section '{section}' already exists in {origin}")]
    DuplicateOption {
        origin: String,
        section: String,
        option: String,
    },

    /// Requested section is absent
    #[error("No section: '{section}'")]
    NoSuchSection { section: String },

    /// Requested option is absent
    #[error("No option '{option}' in section '{section}'")]
    NoSuchOption { section: String, option: String },

    /// Attempt to modify a store that does not accept writes
    #[error("Cannot modify '{section}:{option}' on read-only {store}")]
    ReadOnly {
        store: String,
        section: String,
        option: String,
    },

    /// A `${...}` reference could not be resolved
    #[error("Cannot interpolate {section}:{option} = {value}: {reason}")]
    Interpolation {
        section: String,
        option: String,
        value: String,
        reason: String,
    },

    /// Interpolation exceeded the maximum nesting depth
    #[error("Interpolation of {section}:{option} exceeded the maximum depth")]
    InterpolationDepth { section: String, option: String },

    /// The import section has options other than the recognized ones
    #[error("Invalid options in section '{section}': {options}")]
    InvalidImportOptions { section: String, options: String },

    /// Both `config_file` and `config_files` are given
    #[error("Cannot have both 'config_file' and 'config_files' in section '{section}'")]
    ConflictingImportFiles { section: String },

    /// A declared reference names a section that does not exist
    #[error("Reference '{reference}' in section '{section}' not found")]
    MissingReference { section: String, reference: String },

    /// A descriptor names more than one loader strategy
    #[error("Conflicting loader options in section '{section}': {found}")]
    ConflictingLoader { section: String, found: String },

    /// A descriptor names no loader strategy
    #[error("No loader information for '{section}'")]
    NoLoader { section: String },

    /// Unknown logical loader type
    #[error("Unknown configuration type: '{config_type}'")]
    UnknownType { config_type: String },

    /// Unknown registered class name
    #[error("Unknown configurable class: '{class_name}'")]
    UnknownClass { class_name: String },

    /// Option given to a loader that it does not accept
    #[error("Unexpected option '{option}' for {loader} in section '{section}'")]
    UnexpectedOption {
        loader: String,
        section: String,
        option: String,
    },

    /// Malformed typed value syntax
    #[error("Cannot parse '{raw}': {reason}")]
    Serialization { raw: String, reason: String },

    /// Malformed conditional YAML node
    #[error("Bad condition at '{path}': {reason}")]
    Condition { path: String, reason: String },

    /// Object instantiation from a section failed
    #[error("Cannot create instance from section '{section}': {reason}")]
    Instance { section: String, reason: String },

    /// YAML decoding failed
    #[error("Could not parse YAML in {origin}: {source}")]
    Yaml {
        origin: String,
        source: serde_yaml_ng::Error,
    },

    /// JSON decoding failed
    #[error("Could not parse JSON in {origin}: {source}")]
    Json {
        origin: String,
        source: serde_json::Error,
    },

    /// Configuration of the engine itself is inconsistent
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl ConfigError {
    /// Create a file not found error
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Create a file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a no such section error
    pub fn no_such_section(section: impl Into<String>) -> Self {
        Self::NoSuchSection {
            section: section.into(),
        }
    }

    /// Create a no such option error
    pub fn no_such_option(section: impl Into<String>, option: impl Into<String>) -> Self {
        Self::NoSuchOption {
            section: section.into(),
            option: option.into(),
        }
    }

    /// Create a read-only error
    pub fn read_only(
        store: impl Into<String>,
        section: impl Into<String>,
        option: impl Into<String>,
    ) -> Self {
        Self::ReadOnly {
            store: store.into(),
            section: section.into(),
            option: option.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Serialization {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Whether this error came from unresolvable `${...}` references
    pub fn is_interpolation(&self) -> bool {
        matches!(
            self,
            Self::Interpolation { .. } | Self::InterpolationDepth { .. }
        )
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
