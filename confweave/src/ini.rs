//! INI backed configuration
//!
//! The dialect matches common `.ini`/`.conf` files:
//! - `[section]` headers, case sensitive
//! - `key = value` or `key: value`, keys lower-cased
//! - full-line `#` and `;` comments
//! - indented lines continue the previous value
//! - a repeated section or option within one file is an error
//!
//! A directory source reads every file in it, in name order, with later
//! files overriding earlier ones.

use crate::configurable::{
    Configurable, ReadMode, Section, SectionStore, Sections, DEFAULT_SECTION,
};
use crate::interpolate::{self, LayeredLookup};
use crate::{ConfigError, ConfigResult, Serializer};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Configuration read from INI text
#[derive(Debug, Clone)]
pub struct IniConfig {
    origin: String,
    store: SectionStore,
    default_section: String,
    interpolation: bool,
    fallback: Sections,
    serializer: Serializer,
    files: Vec<PathBuf>,
}

impl Default for IniConfig {
    fn default() -> Self {
        Self::from_sections("<memory>", Sections::new())
    }
}

impl IniConfig {
    /// An empty, writable store
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap already parsed sections
    pub fn from_sections(origin: impl Into<String>, sections: Sections) -> Self {
        Self {
            origin: origin.into(),
            store: SectionStore::new(sections),
            default_section: DEFAULT_SECTION.to_string(),
            interpolation: false,
            fallback: Sections::new(),
            serializer: Serializer::default(),
            files: Vec::new(),
        }
    }

    /// Parse INI text
    pub fn parse(origin: impl Into<String>, text: &str) -> ConfigResult<Self> {
        let origin = origin.into();
        let mut sections = Sections::new();
        parse_ini(&origin, text, &mut sections)?;
        Ok(Self::from_sections(origin, sections))
    }

    /// Read an INI file, or every file of a directory
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        info!("parsing: {}", path.display());
        let files = if path.is_dir() {
            let mut files = Vec::new();
            for entry in WalkDir::new(path)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
            {
                let entry = entry.map_err(|e| ConfigError::file_read(path, e.into()))?;
                if entry.path().is_file() {
                    files.push(entry.into_path());
                }
            }
            files
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(ConfigError::file_not_found(path));
        };

        let mut sections = Sections::new();
        for file in &files {
            let text = fs::read_to_string(file).map_err(|e| ConfigError::file_read(file, e))?;
            let mut parsed = Sections::new();
            parse_ini(&file.display().to_string(), &text, &mut parsed)?;
            for (name, options) in parsed {
                sections.entry(name).or_default().extend(options);
            }
        }
        let mut config = Self::from_sections(path.display().to_string(), sections);
        // a directory is listed ahead of its files so adding or removing one is seen
        config.files = if path.is_dir() {
            std::iter::once(path.to_path_buf()).chain(files).collect()
        } else {
            files
        };
        Ok(config)
    }

    /// Resolve `${section:option}` references on interpolated reads
    pub fn with_interpolation(mut self, interpolation: bool) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_default_section(mut self, section: impl Into<String>) -> Self {
        self.default_section = section.into();
        self
    }

    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    /// Values references may resolve against when this store lacks them
    pub fn with_fallback(mut self, fallback: Sections) -> Self {
        self.fallback = fallback;
        self
    }

    /// Record files that contributed to this store
    pub fn with_source_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    /// The stored template text of every section
    pub fn raw_sections(&self) -> &Sections {
        &self.store.sections
    }

    pub(crate) fn fallback_mut(&mut self) -> &mut Sections {
        &mut self.fallback
    }

    fn interpolate_value(&self, section: &str, option: &str, value: &str) -> ConfigResult<String> {
        let lookup = LayeredLookup::new()
            .layer(&self.store.sections)
            .layer(&self.fallback);
        interpolate::interpolate(&lookup, section, option, value)
    }
}

impl Configurable for IniConfig {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn sections(&self) -> Vec<String> {
        self.store.names()
    }

    fn options(&self, section: &str, mode: ReadMode) -> ConfigResult<Section> {
        let raw = self.store.get(section)?;
        if mode == ReadMode::Raw || !self.interpolation {
            return Ok(raw.clone());
        }
        let mut options = Section::with_capacity(raw.len());
        for (k, v) in raw {
            options.insert(k.clone(), self.interpolate_value(section, k, v)?);
        }
        Ok(options)
    }

    fn option(&self, section: &str, option: &str, mode: ReadMode) -> ConfigResult<Option<String>> {
        let raw = self.store.get(section)?;
        let Some(value) = raw.get(option).or_else(|| raw.get(&option.to_lowercase())) else {
            return Ok(None);
        };
        if mode == ReadMode::Raw || !self.interpolation {
            return Ok(Some(value.clone()));
        }
        self.interpolate_value(section, option, value).map(Some)
    }

    fn set_option(&mut self, section: &str, option: &str, value: &str) -> ConfigResult<()> {
        self.store.set(section, &option.to_lowercase(), value);
        Ok(())
    }

    fn remove_section(&mut self, section: &str) -> ConfigResult<bool> {
        Ok(self.store.remove(section))
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

    fn interpolates(&self) -> bool {
        self.interpolation
    }

    fn fallback(&self) -> Option<&Sections> {
        Some(&self.fallback)
    }
}

/// Parse INI `text` into `sections`, rejecting repeats within this text
pub(crate) fn parse_ini(origin: &str, text: &str, sections: &mut Sections) -> ConfigResult<()> {
    let parse_error = |line: usize, message: &str| ConfigError::Parse {
        origin: origin.to_string(),
        line,
        message: message.to_string(),
    };
    let mut seen_sections: HashSet<String> = HashSet::new();
    let mut seen_options: HashSet<(String, String)> = HashSet::new();
    let mut current: Option<String> = None;
    let mut last_option: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            last_option = None;
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with(';') {
            continue;
        }
        let indented = line.starts_with(char::is_whitespace);
        if indented {
            if let (Some(section), Some(option)) = (&current, &last_option) {
                if let Some(value) = sections
                    .get_mut(section)
                    .and_then(|options| options.get_mut(option))
                {
                    if !value.is_empty() {
                        value.push('\n');
                    }
                    value.push_str(trimmed);
                    continue;
                }
            }
        }
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let name = trimmed[1..trimmed.len() - 1].to_string();
            if name.is_empty() {
                return Err(parse_error(line_no, "empty section header"));
            }
            if !seen_sections.insert(name.clone()) {
                return Err(ConfigError::DuplicateSection {
                    origin: origin.to_string(),
                    section: name,
                });
            }
            sections.entry(name.clone()).or_default();
            current = Some(name);
            last_option = None;
            continue;
        }
        let Some(section) = current.clone() else {
            return Err(parse_error(line_no, "missing section header"));
        };
        let Some(delim) = trimmed.find(['=', ':']) else {
            return Err(parse_error(line_no, "expected 'key = value'"));
        };
        let key = trimmed[..delim].trim().to_lowercase();
        let value = trimmed[delim + 1..].trim().to_string();
        if key.is_empty() {
            return Err(parse_error(line_no, "empty option name"));
        }
        if !seen_options.insert((section.clone(), key.clone())) {
            return Err(ConfigError::DuplicateOption {
                origin: origin.to_string(),
                section,
                option: key,
            });
        }
        sections
            .entry(section)
            .or_default()
            .insert(key.clone(), value);
        last_option = Some(key);
    }
    debug!("parsed {} sections from {}", sections.len(), origin);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
# leading comment
[default]
root = /srv/app
Name = sample

[paths]
data: ${default:root}/data
logs = ${data}/logs
; trailing comment
[multi]
text = first
    second
"#;

    #[test]
    fn test_parse_sections_and_options() {
        let config = IniConfig::parse("sample", SAMPLE).unwrap();
        assert_eq!(config.sections(), vec!["default", "paths", "multi"]);
        assert_eq!(config.get_option("name", None).unwrap(), "sample");
        assert_eq!(config.get_option("text", Some("multi")).unwrap(), "first\nsecond");
    }

    #[test]
    fn test_interpolation_toggle_and_raw_mode() {
        let plain = IniConfig::parse("sample", SAMPLE).unwrap();
        assert_eq!(
            plain.get_option("logs", Some("paths")).unwrap(),
            "${data}/logs"
        );

        let config = plain.with_interpolation(true);
        assert_eq!(
            config.get_option("logs", Some("paths")).unwrap(),
            "/srv/app/data/logs"
        );
        let raw = config.options("paths", ReadMode::Raw).unwrap();
        assert_eq!(raw["data"], "${default:root}/data");
    }

    #[test]
    fn test_fallback_resolves_foreign_references() {
        let mut foreign = Sections::new();
        foreign
            .entry("s1".to_string())
            .or_default()
            .insert("x".to_string(), "1".to_string());
        let config = IniConfig::parse("b", "[s2]\ny = ${s1:x}\n")
            .unwrap()
            .with_interpolation(true)
            .with_fallback(foreign);
        assert_eq!(config.get_option("y", Some("s2")).unwrap(), "1");
    }

    #[test]
    fn test_duplicate_section_and_option_rejected() {
        let err = IniConfig::parse("dup", "[a]\nx = 1\n[a]\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSection { ref section, .. } if section == "a"));

        let err = IniConfig::parse("dup", "[a]\nx = 1\nX = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateOption { ref option, .. } if option == "x"));
    }

    #[test]
    fn test_missing_header_is_parse_error() {
        let err = IniConfig::parse("bad", "x = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = IniConfig::from_path("/definitely/not/here.conf").unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn test_directory_source_concatenates_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.conf"), "[s]\nk = from-b\n").unwrap();
        fs::write(dir.path().join("a.conf"), "[s]\nk = from-a\nother = 1\n").unwrap();

        let config = IniConfig::from_path(dir.path()).unwrap();
        assert_eq!(config.get_option("k", Some("s")).unwrap(), "from-b");
        assert_eq!(config.get_option("other", Some("s")).unwrap(), "1");
        assert_eq!(
            config.source_files(),
            vec![
                dir.path().to_path_buf(),
                dir.path().join("a.conf"),
                dir.path().join("b.conf")
            ]
        );
    }

    #[test]
    fn test_set_and_remove() {
        let mut config = IniConfig::new();
        config.set_option("new", "Key", "v").unwrap();
        assert!(config.has_option("key", Some("new")));
        assert!(config.remove_section("new").unwrap());
        assert!(!config.remove_section("new").unwrap());
        assert!(matches!(
            config.get_options("new"),
            Err(ConfigError::NoSuchSection { .. })
        ));
    }
}
