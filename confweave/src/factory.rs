//! Creation of configuration stores from descriptors, types and paths
//!
//! A descriptor is the option map of one import section. It names exactly one
//! loader strategy:
//!
//! - `class_name = <name>`: a built-in store or one added with
//!   [`ConfigurableFactory::register`]
//! - `type = <type>`: a logical store type such as `ini` or `importini`
//! - `config_file = <path>`: the type is picked from the file extension
//!
//! Every other option is handed to the chosen loader, which rejects the ones
//! it does not understand.

use crate::condyaml::ConditionalYamlConfig;
use crate::configurable::{Configurable, Section};
use crate::env::EnvironmentConfig;
use crate::import::{ImportIniConfig, ImportTreeConfig, ImportYamlConfig, CONFIG_FILE, CONFIG_FILES};
use crate::ini::IniConfig;
use crate::json::JsonConfig;
use crate::string::{StringConfig, DEFAULT_OPTION_SEPARATOR};
use crate::value::Value;
use crate::yaml::YamlConfig;
use crate::{ConfigError, ConfigResult, Serializer};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Descriptor option naming a registered or built-in store
pub const CLASS_NAME: &str = "class_name";

/// Descriptor option naming a logical store type
pub const TYPE_NAME: &str = "type";

/// Descriptor option adding extension to type mappings
pub const TYPE_MAP: &str = "type_map";

/// Builds a store from the options left in a descriptor
pub type ConfigurableConstructor = Arc<
    dyn Fn(&ConfigurableFactory, &mut LoaderParams) -> ConfigResult<Box<dyn Configurable>>
        + Send
        + Sync,
>;

/// Store types keyed by the class names descriptors may use for them
const BUILTIN_CLASSES: [(&str, &str); 9] = [
    ("IniConfig", "ini"),
    ("YamlConfig", "yaml"),
    ("JsonConfig", "json"),
    ("ImportIniConfig", "importini"),
    ("ImportYamlConfig", "importyaml"),
    ("ImportTreeConfig", "importtree"),
    ("ConditionalYamlConfig", "condyaml"),
    ("StringConfig", "string"),
    ("EnvironmentConfig", "environment"),
];

/// Options of one descriptor, consumed by the loader that reads them
#[derive(Debug, Clone, Default)]
pub struct LoaderParams {
    section: String,
    options: Section,
}

impl LoaderParams {
    pub fn new(section: impl Into<String>, options: Section) -> Self {
        Self {
            section: section.into(),
            options,
        }
    }

    /// Name of the descriptor section
    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.options.insert(key.into(), value.into());
    }

    /// Remove and return an option
    pub fn take(&mut self, key: &str) -> Option<String> {
        self.options.shift_remove(key)
    }

    /// Remove an option and parse it as a path
    pub fn take_path(&mut self, key: &str, serializer: &Serializer) -> ConfigResult<Option<PathBuf>> {
        match self.take(key) {
            None => Ok(None),
            Some(raw) => Ok(Some(to_path(&raw, serializer)?)),
        }
    }

    /// Remove an option and parse it as a boolean
    pub fn take_bool(&mut self, key: &str, serializer: &Serializer) -> ConfigResult<Option<bool>> {
        match self.take(key) {
            None => Ok(None),
            Some(raw) => match serializer.parse_object(&raw)? {
                Value::Bool(b) => Ok(Some(b)),
                _ => Err(ConfigError::serialization(raw, "expecting True or False")),
            },
        }
    }

    /// Remove a required file option
    pub fn require_path(&mut self, loader: &str, serializer: &Serializer) -> ConfigResult<PathBuf> {
        self.take_path(CONFIG_FILE, serializer)?.ok_or_else(|| {
            ConfigError::invalid(format!(
                "{} in section '{}' needs a '{}'",
                loader, self.section, CONFIG_FILE
            ))
        })
    }

    /// Options nobody consumed
    pub fn remaining(&self) -> &Section {
        &self.options
    }

    /// Take every remaining option
    pub fn drain(&mut self) -> Section {
        std::mem::take(&mut self.options)
    }

    /// Fail if a loader left options unread
    pub fn finish(self, loader: &str) -> ConfigResult<()> {
        match self.options.keys().next() {
            None => Ok(()),
            Some(option) => Err(ConfigError::UnexpectedOption {
                loader: loader.to_string(),
                section: self.section.clone(),
                option: option.clone(),
            }),
        }
    }
}

/// Parse a file option, resolving `path:`/`resource:` forms
fn to_path(raw: &str, serializer: &Serializer) -> ConfigResult<PathBuf> {
    Ok(match serializer.parse_object(raw)? {
        Value::Path(path) => path,
        _ => PathBuf::from(raw),
    })
}

/// Creates [`Configurable`] stores by class name, type, path or descriptor
#[derive(Clone)]
pub struct ConfigurableFactory {
    registry: IndexMap<String, ConfigurableConstructor>,
    type_map: IndexMap<String, String>,
    serializer: Serializer,
}

impl fmt::Debug for ConfigurableFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurableFactory")
            .field("registry", &self.registry.keys().collect::<Vec<_>>())
            .field("type_map", &self.type_map)
            .finish()
    }
}

impl Default for ConfigurableFactory {
    fn default() -> Self {
        let type_map = [
            ("conf", "ini"),
            ("ini", "ini"),
            ("yml", "yaml"),
            ("yaml", "yaml"),
            ("json", "json"),
        ]
        .into_iter()
        .map(|(ext, t)| (ext.to_string(), t.to_string()))
        .collect();
        Self {
            registry: IndexMap::new(),
            type_map,
            serializer: Serializer::default(),
        }
    }
}

impl ConfigurableFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constructor selectable with `class_name = <name>`
    pub fn register<F>(mut self, class_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&ConfigurableFactory, &mut LoaderParams) -> ConfigResult<Box<dyn Configurable>>
            + Send
            + Sync
            + 'static,
    {
        self.registry.insert(class_name.into(), Arc::new(constructor));
        self
    }

    /// Map a file extension (without the dot) to a store type
    pub fn with_type_mapping(mut self, extension: impl Into<String>, config_type: impl Into<String>) -> Self {
        self.type_map.insert(extension.into(), config_type.into());
        self
    }

    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// The store type used for files with `extension`
    pub fn extension_type(&self, extension: &str) -> Option<&str> {
        self.type_map.get(extension).map(String::as_str)
    }

    /// Create a store from a built-in or registered class name
    ///
    /// Built-in names match either exactly or by their last `.` component.
    pub fn from_class_name(
        &self,
        class_name: &str,
        params: &mut LoaderParams,
    ) -> ConfigResult<Box<dyn Configurable>> {
        if let Some(constructor) = self.registry.get(class_name) {
            debug!("creating registered class '{}'", class_name);
            return constructor(self, params);
        }
        let short = class_name.rsplit('.').next().unwrap_or(class_name);
        match BUILTIN_CLASSES.iter().find(|(name, _)| *name == short) {
            Some((_, config_type)) => self.from_type(config_type, params),
            None => Err(ConfigError::UnknownClass {
                class_name: class_name.to_string(),
            }),
        }
    }

    /// Create a store from a logical type
    ///
    /// The type is used as given; extension mappings apply only in
    /// [`from_path`](Self::from_path).
    pub fn from_type(
        &self,
        config_type: &str,
        params: &mut LoaderParams,
    ) -> ConfigResult<Box<dyn Configurable>> {
        debug!("creating config of type '{}' for [{}]", config_type, params.section());
        let serializer = &self.serializer;
        let config: Box<dyn Configurable> = match config_type {
            "ini" => {
                let path = params.require_path("IniConfig", serializer)?;
                let default_section = params.take("default_section");
                let mut config = IniConfig::from_path(path)?.with_serializer(serializer.clone());
                if let Some(section) = default_section {
                    config = config.with_default_section(section);
                }
                Box::new(config)
            }
            "yaml" => {
                let path = params.require_path("YamlConfig", serializer)?;
                let delimiter = match params.take("delimiter") {
                    None => Some('$'),
                    Some(d) if d == "None" => None,
                    Some(d) => d.chars().next(),
                };
                let mut config = YamlConfig::from_path(path, delimiter)?
                    .with_serializer(serializer.clone())?;
                if let Some(section) = params.take("default_section") {
                    config = config.with_default_section(section)?;
                }
                if let Some(name) = params.take("sections_name") {
                    config = config.with_sections_name(name)?;
                }
                Box::new(config)
            }
            "json" => {
                let path = params.require_path("JsonConfig", serializer)?;
                let mut config = JsonConfig::from_path(path)?;
                if let Some(section) = params.take("default_section") {
                    config = config.with_default_section(section);
                }
                Box::new(config)
            }
            "import" | "importini" => {
                let path = params.require_path("ImportIniConfig", serializer)?;
                let mut config = ImportIniConfig::from_path(path).factory(self.clone());
                if let Some(section) = params.take("config_section") {
                    config = config.config_section(section);
                }
                if let Some(exclude) = params.take_bool("exclude_config_sections", serializer)? {
                    config = config.exclude_config_sections(exclude);
                }
                if let Some(robust) = params.take_bool("robust", serializer)? {
                    config = config.robust(robust);
                }
                if let Some(section) = params.take("default_section") {
                    config = config.default_section(section);
                }
                Box::new(config)
            }
            "importyaml" => {
                let path = params.require_path("ImportYamlConfig", serializer)?;
                let mut config = ImportYamlConfig::from_path(path)?.factory(self.clone());
                if let Some(name) = params.take("import_name") {
                    config = config.import_name(name);
                }
                Box::new(config)
            }
            "condyaml" => {
                let path = params.require_path("ConditionalYamlConfig", serializer)?;
                let mut config = ConditionalYamlConfig::from_path(path)?.factory(self.clone());
                if let Some(name) = params.take("import_name") {
                    config = config.import_name(name);
                }
                Box::new(config)
            }
            "importtree" => {
                let section = params.section().to_string();
                let body = params.drain();
                Box::new(ImportTreeConfig::new(section, body, self.clone())?)
            }
            "string" => {
                let literal = params.take("config_str").ok_or_else(|| {
                    ConfigError::invalid(format!(
                        "StringConfig in section '{}' needs a 'config_str'",
                        params.section()
                    ))
                })?;
                let separator = params
                    .take("option_sep_regex")
                    .unwrap_or_else(|| DEFAULT_OPTION_SEPARATOR.to_string());
                let default_section = params
                    .take("default_section")
                    .unwrap_or_else(|| crate::DEFAULT_SECTION.to_string());
                Box::new(StringConfig::with_options(&literal, &separator, &default_section)?)
            }
            "env" | "environment" => {
                let mut config = EnvironmentConfig::new();
                if let Some(section) = params.take("section_name") {
                    config = config.with_section(section);
                }
                if let Some(includes) = params.take("includes") {
                    config = config.with_includes(serializer.parse_names(&includes)?);
                }
                if params.take_bool("skip_delimiter", serializer)? == Some(true) {
                    config = config.with_escaped_delimiter();
                }
                Box::new(config)
            }
            other => {
                return Err(ConfigError::UnknownType {
                    config_type: other.to_string(),
                })
            }
        };
        Ok(config)
    }

    /// Create a store from a file or directory path
    ///
    /// Directories are read as INI. Files whose extension is not mapped are
    /// loaded as INI imports.
    pub fn from_path(
        &self,
        path: &Path,
        params: &mut LoaderParams,
    ) -> ConfigResult<Box<dyn Configurable>> {
        if path.is_dir() {
            info!("reading configuration directory: {}", path.display());
            return Ok(Box::new(
                IniConfig::from_path(path)?.with_serializer(self.serializer.clone()),
            ));
        }
        let config_type = self.path_type(path).to_string();
        params.insert(CONFIG_FILE, format!("path: {}", path.display()));
        self.from_type(&config_type, params)
    }

    /// Create a store from an import descriptor section
    pub fn from_section(&self, options: &Section, section: &str) -> ConfigResult<Box<dyn Configurable>> {
        let mut params = LoaderParams::new(section, options.clone());
        let strategies: Vec<&str> = [CLASS_NAME, TYPE_NAME]
            .into_iter()
            .filter(|k| params.contains(k))
            .collect();
        if strategies.len() > 1 {
            return Err(ConfigError::ConflictingLoader {
                section: section.to_string(),
                found: strategies.join(", "),
            });
        }
        if params.contains(CONFIG_FILE) && params.contains(CONFIG_FILES) {
            return Err(ConfigError::ConflictingImportFiles {
                section: section.to_string(),
            });
        }

        let factory = match params.take(TYPE_MAP) {
            None => self.clone(),
            Some(raw) => self.with_descriptor_type_map(&raw)?,
        };
        let config_file = match params.get(CONFIG_FILE) {
            Some(raw) => Some(to_path(raw, &factory.serializer)?),
            None => None,
        };
        if let Some(path) = &config_file {
            params.insert(CONFIG_FILE, format!("path: {}", path.display()));
        }
        debug!(
            "section [{}]: class: {:?}, type: {:?}, config: {:?}",
            section,
            params.get(CLASS_NAME),
            params.get(TYPE_NAME),
            config_file
        );

        let config = if let Some(class_name) = params.take(CLASS_NAME) {
            factory.from_class_name(&class_name, &mut params)?
        } else if let Some(mut config_type) = params.take(TYPE_NAME) {
            if config_type == "import" {
                if let Some(path) = &config_file {
                    config_type = factory.import_type(path);
                }
            }
            factory.from_type(&config_type, &mut params)?
        } else if let Some(path) = config_file {
            params.take(CONFIG_FILE);
            factory.from_path(&path, &mut params)?
        } else {
            return Err(ConfigError::NoLoader {
                section: section.to_string(),
            });
        };
        params.finish(&config.origin())?;
        info!("created config: {}", config.origin());
        Ok(config)
    }

    /// A copy of this factory with a descriptor's extension overrides
    fn with_descriptor_type_map(&self, raw: &str) -> ConfigResult<Self> {
        let mut factory = self.clone();
        match self.serializer.parse_object(raw)? {
            Value::Dict(map) => {
                for (ext, config_type) in map {
                    factory
                        .type_map
                        .insert(ext, config_type.to_plain_string());
                }
                Ok(factory)
            }
            _ => Err(ConfigError::serialization(raw, "expecting a type map dictionary")),
        }
    }

    fn path_type(&self, path: &Path) -> &str {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        debug!("using extension to map: '{}'", ext);
        self.extension_type(ext).unwrap_or("importini")
    }

    /// Type for `type = import` given the file being imported
    fn import_type(&self, path: &Path) -> String {
        match self.path_type(path) {
            "ini" => "importini".to_string(),
            "yaml" => "importyaml".to_string(),
            other => other.to_string(),
        }
    }
}
