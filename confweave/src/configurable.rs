//! The section/option store abstraction shared by every configuration source

use crate::import::ImportContext;
use crate::interpolate;
use crate::{ConfigError, ConfigResult, Serializer, Settings, Value};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Options of one section, in declaration order
pub type Section = IndexMap<String, String>;

/// Every section of a store, in declaration order
pub type Sections = IndexMap<String, Section>;

/// Section name used when a store is given none
pub const DEFAULT_SECTION: &str = "default";

/// Whether `${...}` references are resolved when reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Resolve references (stores without interpolation return raw text)
    #[default]
    Interpolated,
    /// Return the stored template text verbatim
    Raw,
}

/// Policy for [`Configurable::copy_sections`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOptions {
    /// Drop failing sections instead of aborting the copy
    pub robust: bool,
    pub mode: ReadMode,
}

impl CopyOptions {
    pub fn robust() -> Self {
        Self {
            robust: true,
            ..Self::default()
        }
    }

    pub fn raw() -> Self {
        Self {
            mode: ReadMode::Raw,
            ..Self::default()
        }
    }

    pub fn with_robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }
}

/// Outcome of a [`Configurable::copy_sections`] call
#[derive(Debug, Default)]
pub struct CopyReport {
    pub copied: Vec<String>,
    pub dropped: Vec<String>,
    /// Only the most recent failure is kept when several sections are dropped
    pub last_error: Option<ConfigError>,
}

impl CopyReport {
    pub(crate) fn drop_section(&mut self, target: &mut dyn Configurable, section: String, err: ConfigError) {
        warn!("dropping section '{}': {}", section, err);
        if let Err(e) = target.remove_section(&section) {
            debug!("could not remove dropped section '{}': {}", section, e);
        }
        self.dropped.push(section);
        self.last_error = Some(err);
    }
}

/// A two level `section -> option -> string` store
///
/// Implementations differ only in where values come from. Reads that resolve
/// references go through [`ReadMode::Interpolated`]; [`ReadMode::Raw`] hands
/// back template text so it can be copied into a store that interpolates
/// against a larger set of sources later.
pub trait Configurable: fmt::Debug {
    /// Human readable name of where the values came from
    fn origin(&self) -> String;

    /// Section names in declaration order
    fn sections(&self) -> Vec<String>;

    /// All options of `section`
    ///
    /// Fails with [`ConfigError::NoSuchSection`] if the section is absent.
    fn options(&self, section: &str, mode: ReadMode) -> ConfigResult<Section>;

    /// Set an option, creating the section if needed
    fn set_option(&mut self, section: &str, option: &str, value: &str) -> ConfigResult<()>;

    /// Remove a section, returning whether it existed
    fn remove_section(&mut self, section: &str) -> ConfigResult<bool>;

    /// Section used for unqualified lookups
    fn default_section(&self) -> &str;

    fn serializer(&self) -> &Serializer;

    /// Files read to build this store
    fn source_files(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Whether interpolated reads resolve `${...}` references
    fn interpolates(&self) -> bool {
        false
    }

    /// Raw values from other sources that references may resolve against
    fn fallback(&self) -> Option<&Sections> {
        None
    }

    /// Sections an enclosing import must remove after merging this store
    fn pending_cleanups(&self) -> Vec<String> {
        Vec::new()
    }

    /// Load any imports this store declares
    ///
    /// Called once by an enclosing import with the values loaded so far. Plain
    /// stores have nothing to resolve.
    fn resolve_imports(&mut self, _context: &ImportContext) -> ConfigResult<()> {
        Ok(())
    }

    /// A single option, `None` if the section exists but the option does not
    fn option(&self, section: &str, option: &str, mode: ReadMode) -> ConfigResult<Option<String>> {
        let mut options = self.options(section, mode)?;
        Ok(options.swap_remove(option))
    }

    fn has_section(&self, section: &str) -> bool {
        self.sections().iter().any(|s| s == section)
    }

    /// Interpolated options of `section`
    fn get_options(&self, section: &str) -> ConfigResult<Section> {
        self.options(section, ReadMode::Interpolated)
    }

    /// Whether `option` exists in `section` (or the default section)
    fn has_option(&self, option: &str, section: Option<&str>) -> bool {
        let section = section.unwrap_or_else(|| self.default_section());
        matches!(self.option(section, option, ReadMode::Raw), Ok(Some(_)))
    }

    /// Interpolated value of `option` in `section` (or the default section)
    fn get_option(&self, option: &str, section: Option<&str>) -> ConfigResult<String> {
        let section = section.unwrap_or_else(|| self.default_section());
        self.option(section, option, ReadMode::Interpolated)?
            .ok_or_else(|| ConfigError::no_such_option(section, option))
    }

    /// Option value parsed by the store's serializer
    fn get_option_object(&self, option: &str, section: Option<&str>) -> ConfigResult<Value> {
        let raw = self.get_option(option, section)?;
        self.serializer().parse_object(&raw)
    }

    /// All options of a section parsed into typed settings
    fn populate(&self, section: Option<&str>) -> ConfigResult<Settings> {
        let section = section.unwrap_or_else(|| self.default_section());
        let options = self.get_options(section)?;
        let mut settings = Settings::new();
        self.serializer().populate_state(&options, &mut settings)?;
        Ok(settings)
    }

    /// Deserialize a section into an application type
    fn populate_into<T: DeserializeOwned>(&self, section: Option<&str>) -> ConfigResult<T>
    where
        Self: Sized,
    {
        self.populate(section)?.deserialize()
    }

    /// Copy sections (all when `sections` is `None`) into `target`
    ///
    /// Every section is read before anything is written, so a non-robust copy
    /// that fails leaves `target` as it was. In robust mode a failing section
    /// is removed from `target` and the failure is kept in the report.
    fn copy_sections(
        &self,
        target: &mut dyn Configurable,
        sections: Option<&[String]>,
        options: CopyOptions,
    ) -> ConfigResult<CopyReport> {
        let names = match sections {
            Some(names) => names.to_vec(),
            None => self.sections(),
        };
        let resolved = options.mode == ReadMode::Interpolated && self.interpolates();
        let prepare = target.interpolates();
        let mut report = CopyReport::default();
        let mut staged: Vec<(String, Section)> = Vec::with_capacity(names.len());
        for name in names {
            match self.options(&name, options.mode) {
                Ok(values) => staged.push((name, values)),
                Err(err) if options.robust => report.drop_section(target, name, err),
                Err(err) => return Err(err),
            }
        }
        for (name, values) in staged {
            let written = values.iter().try_for_each(|(option, value)| {
                if prepare {
                    target.set_option(&name, option, &interpolate::for_target(value, resolved))
                } else {
                    target.set_option(&name, option, value)
                }
            });
            match written {
                Ok(()) => report.copied.push(name),
                Err(err) if options.robust => report.drop_section(target, name, err),
                Err(err) => return Err(err),
            }
        }
        debug!(
            "copied {} sections from {} to {}",
            report.copied.len(),
            self.origin(),
            target.origin()
        );
        Ok(report)
    }

    /// Copy every section of `other` into this store, overwriting values
    fn merge(&mut self, other: &dyn Configurable) -> ConfigResult<()> {
        let prepare = self.interpolates();
        let resolved = other.interpolates();
        let mut staged = Vec::new();
        for section in other.sections() {
            staged.push((section.clone(), other.get_options(&section)?));
        }
        for (section, values) in staged {
            for (option, value) in values {
                if prepare {
                    self.set_option(&section, &option, &interpolate::for_target(&value, resolved))?;
                } else {
                    self.set_option(&section, &option, &value)?;
                }
            }
        }
        Ok(())
    }
}

/// Shared section storage used by the file and memory backed stores
#[derive(Debug, Clone, Default)]
pub(crate) struct SectionStore {
    pub(crate) sections: Sections,
}

impl SectionStore {
    pub(crate) fn new(sections: Sections) -> Self {
        Self { sections }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.sections.keys().cloned().collect()
    }

    pub(crate) fn get(&self, section: &str) -> ConfigResult<&Section> {
        self.sections
            .get(section)
            .ok_or_else(|| ConfigError::no_such_section(section))
    }

    pub(crate) fn set(&mut self, section: &str, option: &str, value: &str) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(option.to_string(), value.to_string());
    }

    pub(crate) fn remove(&mut self, section: &str) -> bool {
        self.sections.shift_remove(section).is_some()
    }
}
