//! JSON backed configuration
//!
//! The document is a two level object: top level keys are sections and their
//! objects hold the options. When no top level value is an object the whole
//! document is taken as the default section. Non-string values are stored in
//! their serializer form so they parse back to the same typed value.

use crate::configurable::{Configurable, ReadMode, Section, SectionStore, Sections, DEFAULT_SECTION};
use crate::value::Value;
use crate::{ConfigError, ConfigResult, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read-only configuration decoded from a JSON document
#[derive(Debug, Clone)]
pub struct JsonConfig {
    origin: String,
    store: SectionStore,
    default_section: String,
    serializer: Serializer,
    files: Vec<PathBuf>,
}

impl JsonConfig {
    /// Decode JSON text
    pub fn parse(origin: impl Into<String>, text: &str) -> ConfigResult<Self> {
        Self::parse_with(origin, text, DEFAULT_SECTION, Serializer::default())
    }

    /// Decode JSON text using `default_section` for terminal top level values
    pub fn parse_with(
        origin: impl Into<String>,
        text: &str,
        default_section: &str,
        serializer: Serializer,
    ) -> ConfigResult<Self> {
        let origin = origin.into();
        let doc: serde_json::Value = serde_json::from_str(text).map_err(|source| ConfigError::Json {
            origin: origin.clone(),
            source,
        })?;
        let serde_json::Value::Object(root) = doc else {
            return Err(ConfigError::Parse {
                origin,
                line: 1,
                message: "expecting a root level object".to_string(),
            });
        };

        let mut sections = Sections::new();
        let has_sections = root.values().any(serde_json::Value::is_object);
        for (key, value) in root {
            match value {
                serde_json::Value::Object(options) if has_sections => {
                    let section = sections.entry(key).or_default();
                    for (name, value) in options {
                        section.insert(name, json_option(&serializer, value)?);
                    }
                }
                value => {
                    sections
                        .entry(default_section.to_string())
                        .or_default()
                        .insert(key, json_option(&serializer, value)?);
                }
            }
        }
        debug!("decoded {} JSON sections from {}", sections.len(), origin);
        Ok(Self {
            origin,
            store: SectionStore::new(sections),
            default_section: default_section.to_string(),
            serializer,
            files: Vec::new(),
        })
    }

    /// Read a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::file_not_found(path));
        }
        info!("loading config: {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| ConfigError::file_read(path, e))?;
        let mut config = Self::parse(path.display().to_string(), &text)?;
        config.files.push(path.to_path_buf());
        Ok(config)
    }

    pub fn with_default_section(mut self, section: impl Into<String>) -> Self {
        self.default_section = section.into();
        self
    }
}

fn json_option(serializer: &Serializer, value: serde_json::Value) -> ConfigResult<String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        other => serializer.format_option(&Value::from_tagged_json(other)),
    }
}

impl Configurable for JsonConfig {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn sections(&self) -> Vec<String> {
        self.store.names()
    }

    fn options(&self, section: &str, _mode: ReadMode) -> ConfigResult<Section> {
        self.store.get(section).cloned()
    }

    fn set_option(&mut self, section: &str, option: &str, _value: &str) -> ConfigResult<()> {
        Err(ConfigError::read_only(self.origin(), section, option))
    }

    fn remove_section(&mut self, section: &str) -> ConfigResult<bool> {
        Err(ConfigError::read_only(self.origin(), section, "*"))
    }

    fn default_section(&self) -> &str {
        &self.default_section
    }

    fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    fn source_files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }
}
