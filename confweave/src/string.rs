//! Configuration from a `section.key=value, ...` literal, as given on a command line

use crate::configurable::{Configurable, ReadMode, Section, SectionStore, Sections, DEFAULT_SECTION};
use crate::{ConfigError, ConfigResult, Serializer};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

static KEY_VAL_REGEX: OnceLock<Regex> = OnceLock::new();

fn key_val_regex() -> &'static Regex {
    KEY_VAL_REGEX.get_or_init(|| {
        Regex::new(r"^(?:([^.]+?)\.)?([^=]+?)=(.+)$").expect("Invalid key/value regex")
    })
}

/// Default pattern separating `key=value` pairs
pub const DEFAULT_OPTION_SEPARATOR: &str = r"\s*,\s*";

/// Read-only store parsed from `<section>.<name>=<value>[,...]`
///
/// Keys without a section prefix land in the default section.
///
/// ```
/// use confweave::{Configurable, StringConfig};
///
/// let config = StringConfig::new("db.host=localhost, debug=True").unwrap();
/// assert_eq!(config.get_option("host", Some("db")).unwrap(), "localhost");
/// assert_eq!(config.get_option("debug", None).unwrap(), "True");
/// ```
#[derive(Debug, Clone)]
pub struct StringConfig {
    literal: String,
    store: SectionStore,
    default_section: String,
    serializer: Serializer,
}

impl StringConfig {
    pub fn new(literal: &str) -> ConfigResult<Self> {
        Self::with_options(literal, DEFAULT_OPTION_SEPARATOR, DEFAULT_SECTION)
    }

    /// Parse with a custom pair separator pattern and default section
    pub fn with_options(literal: &str, separator: &str, default_section: &str) -> ConfigResult<Self> {
        let separator = Regex::new(separator).map_err(|e| {
            ConfigError::invalid(format!("bad option separator '{}': {}", separator, e))
        })?;
        let mut sections = Sections::new();
        for pair in separator.split(literal.trim()).filter(|p| !p.is_empty()) {
            let caps = key_val_regex().captures(pair).ok_or_else(|| ConfigError::Parse {
                origin: literal.to_string(),
                line: 1,
                message: format!("unexpected format: {}", pair),
            })?;
            let section = caps
                .get(1)
                .map(|m| m.as_str().trim())
                .unwrap_or(default_section);
            let name = caps[2].trim();
            let value = caps[3].trim();
            debug!("section={}, name={}, value={}", section, name, value);
            sections
                .entry(section.to_string())
                .or_default()
                .insert(name.to_string(), value.to_string());
        }
        Ok(Self {
            literal: literal.to_string(),
            store: SectionStore::new(sections),
            default_section: default_section.to_string(),
            serializer: Serializer::default(),
        })
    }
}

impl Configurable for StringConfig {
    fn origin(&self) -> String {
        format!("string '{}'", self.literal)
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
}
