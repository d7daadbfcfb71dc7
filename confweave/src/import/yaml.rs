//! YAML documents that import other configurations

use super::{ImportContext, IMPORT_SECTION};
use crate::configurable::{Configurable, ReadMode, Section};
use crate::factory::ConfigurableFactory;
use crate::value::yaml_scalar_string;
use crate::yaml::{flatten_context, leaf_string, YamlConfig};
use crate::{ConfigError, ConfigResult, Serializer};
use indexmap::IndexMap;
use regex::Regex;
use serde_yaml_ng::{Mapping, Value as Yaml};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, trace};

static SAFE_PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();

fn safe_placeholder_regex() -> &'static Regex {
    SAFE_PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\$(?:(\$)|([a-z0-9_:]+)|\{([a-z0-9_:]+)\})")
            .expect("Invalid placeholder regex")
    })
}

/// A YAML document whose `import` node lists descriptor sections
///
/// ```yaml
/// import:
///   db_cli:
///     config_file: db.conf
/// app:
///   url: pg://${db:host}
/// ```
///
/// Each descriptor is loaded through the [`ConfigurableFactory`] and its
/// sections are grafted into the document, after which `$name` and
/// `${section:option}` placeholders in string values are replaced.
/// Placeholders with no value are left as written.
#[derive(Debug)]
pub struct ImportYamlConfig {
    yaml: YamlConfig,
    import_name: String,
    factory: ConfigurableFactory,
    files: Vec<PathBuf>,
    resolved: bool,
}

impl ImportYamlConfig {
    fn wrap(yaml: YamlConfig) -> Self {
        Self {
            yaml,
            import_name: IMPORT_SECTION.to_string(),
            factory: ConfigurableFactory::default(),
            files: Vec::new(),
            resolved: false,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Ok(Self::wrap(YamlConfig::from_path(path, None)?))
    }

    pub fn parse(origin: impl Into<String>, text: &str) -> ConfigResult<Self> {
        Ok(Self::wrap(YamlConfig::parse_with(origin, text, None)?))
    }

    pub fn factory(mut self, factory: ConfigurableFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Top level key holding the descriptors
    pub fn import_name(mut self, name: impl Into<String>) -> Self {
        self.import_name = name.into();
        self
    }

    /// Resolve imports with no enclosing values
    pub fn load(&mut self) -> ConfigResult<()> {
        self.resolve_imports(&ImportContext::default())
    }

    pub fn yaml(&self) -> &YamlConfig {
        &self.yaml
    }

    pub fn get_tree(&self, path: Option<&str>) -> Option<Yaml> {
        self.yaml.get_tree(path)
    }

    pub(crate) fn set_tree(&mut self, tree: Mapping) -> ConfigResult<()> {
        self.yaml.set_tree(tree)
    }

    fn import(&mut self, context: &ImportContext) -> ConfigResult<()> {
        let origin = self.yaml.origin();
        let mut tree = self.yaml.tree().clone();
        let mut context = context.clone();
        if let Some(node) = tree.get(self.import_name.as_str()).cloned() {
            let Yaml::Mapping(entries) = node else {
                return Err(ConfigError::Parse {
                    origin,
                    line: 1,
                    message: format!("'{}' must map section names to descriptors", self.import_name),
                });
            };
            for (name, params) in &entries {
                let name = yaml_scalar_string(name);
                let section = self.descriptor(&name, params)?;
                let mut child = self.factory.from_section(&section, &name)?;
                child.resolve_imports(&context)?;
                context.absorb(child.as_ref())?;
                self.files.extend(child.source_files());
                for child_section in child.sections() {
                    let options = child.options(&child_section, ReadMode::Interpolated)?;
                    graft(&mut tree, &child_section, options);
                }
            }
            let import_name = self.import_name.clone();
            tree = tree
                .into_iter()
                .filter(|(k, _)| k.as_str() != Some(import_name.as_str()))
                .collect();
        }

        let mut values = IndexMap::new();
        for (section, options) in context.sections() {
            for (option, value) in options {
                values.insert(format!("{}:{}", section, option), value.clone());
            }
        }
        flatten_context(&mut values, "", &tree, ":", self.yaml.serializer())?;
        let tree = substitute_mapping(tree, &values);
        debug!("imported into {}", origin);
        self.yaml.set_tree(tree)
    }

    fn descriptor(&self, name: &str, params: &Yaml) -> ConfigResult<Section> {
        let Yaml::Mapping(params) = params else {
            return Err(ConfigError::Parse {
                origin: self.yaml.origin(),
                line: 1,
                message: format!("import descriptor '{}' must be a mapping", name),
            });
        };
        let mut section = Section::new();
        for (key, value) in params {
            section.insert(
                yaml_scalar_string(key),
                leaf_string(value, self.yaml.serializer())?,
            );
        }
        Ok(section)
    }
}

/// Add imported options to a section node; values written in the document win
fn graft(tree: &mut Mapping, section: &str, options: Section) {
    let key = Yaml::String(section.to_string());
    if !tree.get(section).map_or(false, Yaml::is_mapping) {
        tree.insert(key.clone(), Yaml::Mapping(Mapping::new()));
    }
    if let Some(Yaml::Mapping(node)) = tree.get_mut(&key) {
        for (option, value) in options {
            if node.get(option.as_str()).is_none() {
                node.insert(Yaml::String(option), Yaml::String(value));
            }
        }
    }
}

fn substitute_mapping(tree: Mapping, values: &IndexMap<String, String>) -> Mapping {
    tree.into_iter()
        .map(|(k, v)| (k, substitute_node(v, values)))
        .collect()
}

fn substitute_node(node: Yaml, values: &IndexMap<String, String>) -> Yaml {
    match node {
        Yaml::String(s) => Yaml::String(substitute_str(&s, values)),
        Yaml::Sequence(items) => {
            Yaml::Sequence(items.into_iter().map(|n| substitute_node(n, values)).collect())
        }
        Yaml::Mapping(map) => Yaml::Mapping(substitute_mapping(map, values)),
        other => other,
    }
}

fn substitute_str(text: &str, values: &IndexMap<String, String>) -> String {
    safe_placeholder_regex()
        .replace_all(text, |caps: &regex::Captures| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let key = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
            match values.get(key) {
                Some(value) => value.clone(),
                None => {
                    trace!("leaving unknown placeholder '{}'", key);
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

impl Configurable for ImportYamlConfig {
    fn origin(&self) -> String {
        self.yaml.origin()
    }

    fn sections(&self) -> Vec<String> {
        self.yaml.sections()
    }

    fn options(&self, section: &str, mode: ReadMode) -> ConfigResult<Section> {
        self.yaml.options(section, mode)
    }

    fn set_option(&mut self, section: &str, option: &str, value: &str) -> ConfigResult<()> {
        self.yaml.set_option(section, option, value)
    }

    fn remove_section(&mut self, section: &str) -> ConfigResult<bool> {
        self.yaml.remove_section(section)
    }

    fn default_section(&self) -> &str {
        self.yaml.default_section()
    }

    fn serializer(&self) -> &Serializer {
        self.yaml.serializer()
    }

    fn source_files(&self) -> Vec<PathBuf> {
        let mut files = self.yaml.source_files();
        files.extend(self.files.iter().cloned());
        files
    }

    fn resolve_imports(&mut self, context: &ImportContext) -> ConfigResult<()> {
        if self.resolved {
            return Ok(());
        }
        self.import(context)?;
        self.resolved = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configurable::Sections;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_import_and_substitute() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.conf");
        fs::write(&db, "[db]\nhost = localhost\nport = 5432\n").unwrap();
        let text = format!(
            "import:\n  db_cli:\n    config_file: {}\napp:\n  url: pg://${{db:host}}:$db:port\n  cost: $$5\n  other: $unknown\n",
            db.display()
        );
        let mut config = ImportYamlConfig::parse("app.yml", &text).unwrap();
        assert!(config.has_section("import"));
        config.load().unwrap();
        assert!(!config.has_section("import"));
        assert_eq!(
            config.get_option("url", Some("app")).unwrap(),
            "pg://localhost:5432"
        );
        assert_eq!(config.get_option("cost", Some("app")).unwrap(), "$5");
        assert_eq!(config.get_option("other", Some("app")).unwrap(), "$unknown");
        assert_eq!(config.get_option("port", Some("db")).unwrap(), "5432");
        assert_eq!(config.source_files(), vec![db]);
    }

    #[test]
    fn test_document_values_win_over_imports() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db.json");
        fs::write(&db, r#"{"db": {"host": "imported", "user": "app"}}"#).unwrap();
        let text = format!(
            "import:\n  db_json:\n    config_file: {}\ndb:\n  host: local\n",
            db.display()
        );
        let mut config = ImportYamlConfig::parse("t", &text).unwrap();
        config.load().unwrap();
        assert_eq!(config.get_option("host", Some("db")).unwrap(), "local");
        assert_eq!(config.get_option("user", Some("db")).unwrap(), "app");
    }

    #[test]
    fn test_inherited_context_values() {
        let mut inherited = Sections::new();
        inherited.insert(
            "paths".to_string(),
            Section::from_iter([("root".to_string(), "/srv".to_string())]),
        );
        let context = ImportContext::new(inherited);
        let mut config = ImportYamlConfig::parse("t", "app:\n  dir: ${paths:root}/app\n").unwrap();
        config.resolve_imports(&context).unwrap();
        assert_eq!(config.get_option("dir", Some("app")).unwrap(), "/srv/app");
    }

    #[test]
    fn test_bad_import_node() {
        let mut config = ImportYamlConfig::parse("t", "import: [a, b]\n").unwrap();
        assert!(matches!(config.load(), Err(ConfigError::Parse { .. })));
    }
}
