//! Composition of many configuration sources into one store
//!
//! An import-control section (named `import` unless configured otherwise)
//! lists the sources to load:
//!
//! ```ini
//! [import]
//! references = list: default
//! sections = list: db_cli
//!
//! [default]
//! root = /srv/app
//!
//! [db_cli]
//! type = ini
//! config_file = path: ${default:root}/db.conf
//! ```
//!
//! Recognized import-control options:
//!
//! | Option | Meaning |
//! |--------|---------|
//! | `sections` | descriptor sections, loaded in order |
//! | `config_file` / `config_files` | files loaded before the descriptor sections |
//! | `references` | sections available while the descriptors are read |
//! | `cleanups` | sections removed from the result |
//! | `type_map` | extension to store type overrides for the import files |
//! | `enabled` | `False` skips every import |

mod ini;
mod tree;
mod yaml;

pub use ini::{ImportIniConfig, ImportSource, LoadState};
pub use tree::ImportTreeConfig;
pub use yaml::ImportYamlConfig;

use crate::configurable::{Configurable, ReadMode, Sections};
use crate::value::Value;
use crate::{ConfigError, ConfigResult, Serializer};
use regex::Regex;
use std::sync::OnceLock;

/// Default name of the import-control section
pub const IMPORT_SECTION: &str = "import";

/// Descriptor sections to load
pub const SECTIONS_NAME: &str = "sections";

/// A single file to load
pub const CONFIG_FILE: &str = "config_file";

/// Several files to load
pub const CONFIG_FILES: &str = "config_files";

/// Sections needed to read the descriptors
pub const REFERENCES_NAME: &str = "references";

/// Sections removed after the import
pub const CLEANUPS_NAME: &str = "cleanups";

/// Whether an import or descriptor is loaded
pub const ENABLED_NAME: &str = "enabled";

/// Options allowed in the import-control section
pub const IMPORT_SECTION_FIELDS: [&str; 7] = [
    SECTIONS_NAME,
    CONFIG_FILE,
    CONFIG_FILES,
    REFERENCES_NAME,
    CLEANUPS_NAME,
    crate::factory::TYPE_MAP,
    ENABLED_NAME,
];

static ENABLED_LOOKUP_REGEX: OnceLock<Regex> = OnceLock::new();

fn enabled_lookup_regex() -> &'static Regex {
    ENABLED_LOOKUP_REGEX
        .get_or_init(|| Regex::new(r"^([a-zA-Z_-]+):([a-zA-Z_-]+)$").expect("Invalid enabled regex"))
}

/// Values loaded by enclosing imports
///
/// A nested import resolves references against these when its own sources
/// lack them, which is how a child refers to a section loaded by an earlier
/// sibling of its parent.
#[derive(Debug, Clone, Default)]
pub struct ImportContext {
    sections: Sections,
}

impl ImportContext {
    pub fn new(sections: Sections) -> Self {
        Self { sections }
    }

    /// Raw values keyed by section
    pub fn sections(&self) -> &Sections {
        &self.sections
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Add every raw value of `config`, later values replacing earlier ones
    pub(crate) fn absorb(&mut self, config: &dyn Configurable) -> ConfigResult<()> {
        if let Some(fallback) = config.fallback() {
            overlay(&mut self.sections, fallback);
        }
        for section in config.sections() {
            let options = config.options(&section, ReadMode::Raw)?;
            self.sections.entry(section).or_default().extend(options);
        }
        Ok(())
    }
}

/// Copy every value of `source` over `target`
pub(crate) fn overlay(target: &mut Sections, source: &Sections) {
    for (section, options) in source {
        target
            .entry(section.clone())
            .or_default()
            .extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

/// Evaluate an `enabled` option
///
/// The value is either a boolean or a `section:option` reference looked up
/// with `lookup` and then judged by its truthiness.
pub(crate) fn is_enabled(
    raw: Option<&str>,
    serializer: &Serializer,
    lookup: impl Fn(&str, &str) -> ConfigResult<Option<String>>,
) -> ConfigResult<bool> {
    let Some(raw) = raw else {
        return Ok(true);
    };
    match serializer.parse_object(raw)? {
        Value::Bool(enabled) => Ok(enabled),
        Value::Str(s) => {
            let caps = enabled_lookup_regex().captures(&s).ok_or_else(|| {
                ConfigError::serialization(
                    raw,
                    "expecting lookup format <section>:<option> or a boolean",
                )
            })?;
            let value = lookup(&caps[1], &caps[2])?
                .ok_or_else(|| ConfigError::no_such_option(&caps[1], &caps[2]))?;
            Ok(serializer.parse_object(&value)?.is_truthy())
        }
        _ => Err(ConfigError::serialization(
            raw,
            "expecting either a <section>:<option> string or a boolean",
        )),
    }
}
