//! In-memory, construct-once configuration

use crate::configurable::{Configurable, ReadMode, Section, SectionStore, Sections, DEFAULT_SECTION};
use crate::{ConfigError, ConfigResult, Serializer};

/// A two level dictionary given at construction and never modified after
#[derive(Debug, Clone)]
pub struct DictionaryConfig {
    store: SectionStore,
    default_section: String,
    serializer: Serializer,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self::new(Sections::new())
    }
}

impl DictionaryConfig {
    pub fn new(sections: Sections) -> Self {
        Self {
            store: SectionStore::new(sections),
            default_section: DEFAULT_SECTION.to_string(),
            serializer: Serializer::default(),
        }
    }

    /// A store with no sections, used for disabled imports
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_default_section(mut self, section: impl Into<String>) -> Self {
        self.default_section = section.into();
        self
    }

    /// Snapshot every section of another store
    pub fn from_config(source: &dyn Configurable, mode: ReadMode) -> ConfigResult<Self> {
        let mut sections = Sections::new();
        for name in source.sections() {
            let options = source.options(&name, mode)?;
            sections.insert(name, options);
        }
        Ok(Self::new(sections).with_default_section(source.default_section()))
    }
}

impl Configurable for DictionaryConfig {
    fn origin(&self) -> String {
        "<dictionary>".to_string()
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
