//! Process environment exposed as a single section

use crate::configurable::{Configurable, ReadMode, Section};
use crate::{ConfigError, ConfigResult, Serializer};
use indexmap::IndexSet;

/// Section holding the environment unless configured otherwise
pub const DEFAULT_ENV_SECTION: &str = "env";

/// Read-only view of environment variables
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    section: String,
    vars: Section,
    serializer: Serializer,
}

impl EnvironmentConfig {
    /// Snapshot the current process environment
    pub fn new() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from explicit variables
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut vars: Section = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        vars.sort_keys();
        Self {
            section: DEFAULT_ENV_SECTION.to_string(),
            vars,
            serializer: Serializer::default(),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = section.into();
        self
    }

    /// Keep only the named variables
    pub fn with_includes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keep: IndexSet<String> = names.into_iter().map(Into::into).collect();
        self.vars.retain(|k, _| keep.contains(k));
        self
    }

    /// Double every `$` so values pass through an interpolating store verbatim
    pub fn with_escaped_delimiter(mut self) -> Self {
        for value in self.vars.values_mut() {
            *value = value.replace('$', "$$");
        }
        self
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Configurable for EnvironmentConfig {
    fn origin(&self) -> String {
        "<environment>".to_string()
    }

    fn sections(&self) -> Vec<String> {
        vec![self.section.clone()]
    }

    fn options(&self, section: &str, _mode: ReadMode) -> ConfigResult<Section> {
        if section == self.section {
            Ok(self.vars.clone())
        } else {
            Err(ConfigError::no_such_section(section))
        }
    }

    fn set_option(&mut self, section: &str, option: &str, _value: &str) -> ConfigResult<()> {
        Err(ConfigError::read_only(self.origin(), section, option))
    }

    fn remove_section(&mut self, section: &str) -> ConfigResult<bool> {
        Err(ConfigError::read_only(self.origin(), section, "*"))
    }

    fn default_section(&self) -> &str {
        &self.section
    }

    fn serializer(&self) -> &Serializer {
        &self.serializer
    }
}
