//! YAML backed configuration
//!
//! Top level mapping keys are sections. Nested mappings under a section are
//! flattened into dotted option names (`pool.size`), sequences are stored in
//! their serializer form and top level scalars go into the default section.
//! A top level `sections` list, when present, names the sections to expose.
//!
//! Before the document is decoded, `${a.b}` or `$a.b` placeholders in the text
//! are replaced with the scalar at that dotted path, repeatedly until the text
//! stops changing. `$$` is a literal `$`.

use crate::configurable::{Configurable, ReadMode, Section, SectionStore, Sections, DEFAULT_SECTION};
use crate::interpolate::MAX_INTERPOLATION_DEPTH;
use crate::value::{yaml_scalar_string, Value};
use crate::{ConfigError, ConfigResult, Serializer};
use indexmap::IndexMap;
use regex::Regex;
use serde_yaml_ng::{Mapping, Value as Yaml};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Top level key listing the exposed sections
pub const DEFAULT_SECTIONS_NAME: &str = "sections";

/// Configuration decoded from a YAML document
#[derive(Debug, Clone)]
pub struct YamlConfig {
    origin: String,
    text: String,
    tree: Mapping,
    store: SectionStore,
    default_section: String,
    sections_name: String,
    delimiter: Option<char>,
    serializer: Serializer,
    files: Vec<PathBuf>,
}

impl YamlConfig {
    /// Decode YAML text with `$` placeholder substitution
    pub fn parse(origin: impl Into<String>, text: &str) -> ConfigResult<Self> {
        Self::parse_with(origin, text, Some('$'))
    }

    /// Decode YAML text, substituting placeholders introduced by `delimiter`
    /// (no substitution when `None`)
    pub fn parse_with(
        origin: impl Into<String>,
        text: &str,
        delimiter: Option<char>,
    ) -> ConfigResult<Self> {
        let mut config = Self {
            origin: origin.into(),
            text: text.to_string(),
            tree: Mapping::new(),
            store: SectionStore::default(),
            default_section: DEFAULT_SECTION.to_string(),
            sections_name: DEFAULT_SECTIONS_NAME.to_string(),
            delimiter,
            serializer: Serializer::default(),
            files: Vec::new(),
        };
        config.compile()?;
        Ok(config)
    }

    /// Read a YAML file
    pub fn from_path(path: impl AsRef<Path>, delimiter: Option<char>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::file_not_found(path));
        }
        info!("parsing: {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| ConfigError::file_read(path, e))?;
        let mut config = Self::parse_with(path.display().to_string(), &text, delimiter)?;
        config.files.push(path.to_path_buf());
        Ok(config)
    }

    pub fn with_default_section(mut self, section: impl Into<String>) -> ConfigResult<Self> {
        self.default_section = section.into();
        self.rebuild()?;
        Ok(self)
    }

    /// Name of the top level key listing the exposed sections
    pub fn with_sections_name(mut self, name: impl Into<String>) -> ConfigResult<Self> {
        self.sections_name = name.into();
        self.rebuild()?;
        Ok(self)
    }

    pub fn with_serializer(mut self, serializer: Serializer) -> ConfigResult<Self> {
        self.serializer = serializer;
        self.rebuild()?;
        Ok(self)
    }

    /// The decoded document
    pub fn tree(&self) -> &Mapping {
        &self.tree
    }

    /// The node at a dotted path, or the whole document for `None`
    pub fn get_tree(&self, path: Option<&str>) -> Option<Yaml> {
        match path {
            None => Some(Yaml::Mapping(self.tree.clone())),
            Some(path) => find_node(&self.tree, path).cloned(),
        }
    }

    /// Replace the document and recompute the sections
    pub(crate) fn set_tree(&mut self, tree: Mapping) -> ConfigResult<()> {
        self.tree = tree;
        self.rebuild()
    }

    fn compile(&mut self) -> ConfigResult<()> {
        let mut content = self.text.clone();
        if let Some(delimiter) = self.delimiter {
            let struct_ = decode(&self.origin, &content)?;
            let mut context = IndexMap::new();
            flatten_context(&mut context, "", &struct_, ".", &self.serializer)?;
            content = substitute(&self.origin, &content, delimiter, &context)?;
        }
        self.tree = decode(&self.origin, &content)?;
        self.rebuild()
    }

    fn rebuild(&mut self) -> ConfigResult<()> {
        let sections = build_sections(
            &self.tree,
            &self.default_section,
            &self.sections_name,
            &self.serializer,
        )?;
        debug!("{} has sections: {:?}", self.origin, sections.keys());
        self.store = SectionStore::new(sections);
        Ok(())
    }
}

impl Configurable for YamlConfig {
    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn sections(&self) -> Vec<String> {
        self.store.names()
    }

    fn options(&self, section: &str, _mode: ReadMode) -> ConfigResult<Section> {
        self.store.get(section).cloned()
    }

    fn set_option(&mut self, section: &str, option: &str, value: &str) -> ConfigResult<()> {
        if !matches!(self.tree.get(section), Some(Yaml::Mapping(_))) {
            self.tree
                .insert(Yaml::String(section.to_string()), Yaml::Mapping(Mapping::new()));
        }
        if let Some(Yaml::Mapping(options)) = self.tree.get_mut(section) {
            options.insert(Yaml::String(option.to_string()), Yaml::String(value.to_string()));
        }
        self.store.set(section, option, value);
        Ok(())
    }

    fn remove_section(&mut self, section: &str) -> ConfigResult<bool> {
        let before = self.tree.len();
        self.tree = std::mem::take(&mut self.tree)
            .into_iter()
            .filter(|(k, _)| k.as_str() != Some(section))
            .collect();
        let removed = self.store.remove(section);
        Ok(removed || before != self.tree.len())
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

/// Decode a document, treating an empty one as an empty mapping
pub(crate) fn decode(origin: &str, text: &str) -> ConfigResult<Mapping> {
    let doc: Yaml = serde_yaml_ng::from_str(text).map_err(|source| ConfigError::Yaml {
        origin: origin.to_string(),
        source,
    })?;
    match doc {
        Yaml::Null => Ok(Mapping::new()),
        Yaml::Mapping(map) => Ok(map),
        other => Err(ConfigError::Parse {
            origin: origin.to_string(),
            line: 1,
            message: format!("expecting a root level mapping, got {:?}", other),
        }),
    }
}

/// Walk a dotted path through nested mappings
pub(crate) fn find_node<'a>(tree: &'a Mapping, path: &str) -> Option<&'a Yaml> {
    let mut parts = path.split('.');
    let mut node = tree.get(parts.next()?)?;
    for part in parts {
        node = node.as_mapping()?.get(part)?;
    }
    Some(node)
}

/// The stored string form of a leaf node
pub(crate) fn leaf_string(node: &Yaml, serializer: &Serializer) -> ConfigResult<String> {
    match node {
        Yaml::Sequence(_) | Yaml::Mapping(_) => serializer.format_option(&Value::from_yaml(node)),
        Yaml::Tagged(tagged) => leaf_string(&tagged.value, serializer),
        scalar => Ok(yaml_scalar_string(scalar)),
    }
}

/// Collect every leaf under `node` keyed by its `sep` joined path
pub(crate) fn flatten_context(
    context: &mut IndexMap<String, String>,
    path: &str,
    node: &Mapping,
    sep: &str,
    serializer: &Serializer,
) -> ConfigResult<()> {
    for (key, value) in node {
        let key = yaml_scalar_string(key);
        let full = if path.is_empty() {
            key
        } else {
            format!("{}{}{}", path, sep, key)
        };
        match value {
            Yaml::Mapping(child) => flatten_context(context, &full, child, sep, serializer)?,
            leaf => {
                context.insert(full, leaf_string(leaf, serializer)?);
            }
        }
    }
    Ok(())
}

fn build_sections(
    tree: &Mapping,
    default_section: &str,
    sections_name: &str,
    serializer: &Serializer,
) -> ConfigResult<Sections> {
    let listed: Option<Vec<String>> = match tree.get(sections_name) {
        Some(Yaml::Sequence(items)) => Some(items.iter().map(yaml_scalar_string).collect()),
        _ => None,
    };
    let mut sections = Sections::new();
    for (key, value) in tree {
        let name = yaml_scalar_string(key);
        if let Some(listed) = &listed {
            if !listed.contains(&name) {
                continue;
            }
        }
        match value {
            Yaml::Mapping(child) => {
                let mut options = IndexMap::new();
                flatten_context(&mut options, "", child, ".", serializer)?;
                sections.entry(name).or_default().extend(options);
            }
            leaf if listed.is_none() => {
                sections
                    .entry(default_section.to_string())
                    .or_default()
                    .insert(name, leaf_string(leaf, serializer)?);
            }
            _ => {}
        }
    }
    Ok(sections)
}

fn placeholder_regex(delimiter: char) -> ConfigResult<Regex> {
    let d = regex::escape(&delimiter.to_string());
    Regex::new(&format!(
        r"(?i){d}(?:({d})|([a-z][_a-z0-9.]*)|\{{([a-z][_a-z0-9.]*)\}})"
    ))
    .map_err(|e| ConfigError::invalid(format!("bad delimiter '{}': {}", delimiter, e)))
}

/// Replace dotted path placeholders until the text is stable
fn substitute(
    origin: &str,
    text: &str,
    delimiter: char,
    context: &IndexMap<String, String>,
) -> ConfigResult<String> {
    let re = placeholder_regex(delimiter)?;
    let mut content = text.to_string();
    for _ in 0..MAX_INTERPOLATION_DEPTH {
        let mut missing: Option<String> = None;
        let next = re.replace_all(&content, |caps: &regex::Captures| {
            if caps.get(1).is_some() {
                return caps[0].to_string();
            }
            let Some(key) = caps.get(2).or_else(|| caps.get(3)) else {
                return caps[0].to_string();
            };
            match context.get(key.as_str()) {
                Some(value) => value.clone(),
                None => {
                    if missing.is_none() {
                        missing = Some(key.as_str().to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        if let Some(key) = missing {
            let line = content
                .find(&key)
                .map(|pos| content[..pos].lines().count().max(1))
                .unwrap_or(1);
            return Err(ConfigError::Parse {
                origin: origin.to_string(),
                line,
                message: format!("can not substitute YAML template: no such key '{}'", key),
            });
        }
        let next = next.into_owned();
        if next == content {
            let escaped = format!("{}{}", delimiter, delimiter);
            return Ok(content.replace(&escaped, &delimiter.to_string()));
        }
        trace!("substituted YAML template in {}", origin);
        content = next;
    }
    Err(ConfigError::Parse {
        origin: origin.to_string(),
        line: 1,
        message: "YAML template substitution did not converge".to_string(),
    })
}
