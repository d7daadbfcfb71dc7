//! YAML with `condition` nodes evaluated after imports
//!
//! A key named `condition` (or ending in it, such as `db_condition`) holds a
//! node of the form:
//!
//! ```yaml
//! db_condition:
//!   if: ${flags:use_db}
//!   then:
//!     db:
//!       host: localhost
//!   else:
//!     db:
//!       host: none
//! ```
//!
//! The chosen branch's single entry replaces the condition in place. When the
//! chosen branch is absent the condition is dropped.

use crate::configurable::{Configurable, ReadMode, Section};
use crate::factory::ConfigurableFactory;
use crate::import::{ImportContext, ImportYamlConfig};
use crate::value::{yaml_scalar_string, Value};
use crate::{ConfigError, ConfigResult, Serializer};
use regex::Regex;
use serde_yaml_ng::{Mapping, Value as Yaml};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, trace};

static CONDITION_REGEX: OnceLock<Regex> = OnceLock::new();

fn condition_regex() -> &'static Regex {
    CONDITION_REGEX.get_or_init(|| {
        Regex::new(r"^(?:[a-zA-Z0-9_.-]+)?condition$").expect("Invalid condition regex")
    })
}

const IF: &str = "if";
const THEN: &str = "then";
const ELSE: &str = "else";

/// An [`ImportYamlConfig`] whose document may branch on values
#[derive(Debug)]
pub struct ConditionalYamlConfig {
    yaml: ImportYamlConfig,
    unevaluated: Mapping,
    evaluated: bool,
}

impl ConditionalYamlConfig {
    fn wrap(yaml: ImportYamlConfig) -> Self {
        Self {
            unevaluated: yaml.yaml().tree().clone(),
            yaml,
            evaluated: false,
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Ok(Self::wrap(ImportYamlConfig::from_path(path)?))
    }

    pub fn parse(origin: impl Into<String>, text: &str) -> ConfigResult<Self> {
        Ok(Self::wrap(ImportYamlConfig::parse(origin, text)?))
    }

    pub fn factory(mut self, factory: ConfigurableFactory) -> Self {
        self.yaml = self.yaml.factory(factory);
        self
    }

    pub fn import_name(mut self, name: impl Into<String>) -> Self {
        self.yaml = self.yaml.import_name(name);
        self
    }

    /// Resolve imports and conditions with no enclosing values
    pub fn load(&mut self) -> ConfigResult<()> {
        self.resolve_imports(&ImportContext::default())
    }

    /// The node at a dotted path with the conditions on the way evaluated
    ///
    /// Only the conditions along `path` and inside the returned node are
    /// evaluated, so a broken condition elsewhere does not fail the lookup.
    pub fn get_tree(&self, path: Option<&str>) -> ConfigResult<Option<Yaml>> {
        let Some(path) = path else {
            return Ok(Some(Yaml::Mapping(self.evaluate(&self.unevaluated, "")?)));
        };
        let mut node = Yaml::Mapping(self.unevaluated.clone());
        let mut walked = String::new();
        for part in path.split('.') {
            let Yaml::Mapping(map) = &node else {
                return Ok(None);
            };
            let next = match map.get(part) {
                Some(next) if !condition_regex().is_match(part) => next.clone(),
                _ => match self.evaluate_level(map, &walked)?.get(part) {
                    Some(next) => next.clone(),
                    None => return Ok(None),
                },
            };
            node = next;
            walked = join(&walked, part);
        }
        self.evaluate_node(&node, &walked).map(Some)
    }

    /// Conditions of one mapping, leaving nested mappings untouched
    fn evaluate_level(&self, map: &Mapping, path: &str) -> ConfigResult<Mapping> {
        let mut out = Mapping::new();
        for (key, value) in map {
            let name = yaml_scalar_string(key);
            if condition_regex().is_match(&name) {
                if let Some(branch) = self.choose(value, &join(path, &name))? {
                    for (k, v) in branch {
                        out.insert(k, v);
                    }
                }
            } else {
                out.insert(key.clone(), value.clone());
            }
        }
        Ok(out)
    }

    fn evaluate(&self, map: &Mapping, path: &str) -> ConfigResult<Mapping> {
        let level = self.evaluate_level(map, path)?;
        let mut out = Mapping::new();
        for (key, value) in level {
            let child = join(path, &yaml_scalar_string(&key));
            out.insert(key, self.evaluate_node(&value, &child)?);
        }
        Ok(out)
    }

    fn evaluate_node(&self, node: &Yaml, path: &str) -> ConfigResult<Yaml> {
        Ok(match node {
            Yaml::Mapping(map) => Yaml::Mapping(self.evaluate(map, path)?),
            Yaml::Sequence(items) => Yaml::Sequence(
                items
                    .iter()
                    .map(|item| self.evaluate_node(item, path))
                    .collect::<ConfigResult<Vec<_>>>()?,
            ),
            other => other.clone(),
        })
    }

    /// The branch selected by a condition node, if any
    fn choose(&self, node: &Yaml, path: &str) -> ConfigResult<Option<Mapping>> {
        let error = |reason: &str| ConfigError::Condition {
            path: path.to_string(),
            reason: reason.to_string(),
        };
        let Yaml::Mapping(node) = node else {
            return Err(error("expecting a mapping with 'if', 'then' and 'else'"));
        };
        let test = node.get(IF).ok_or_else(|| error("missing 'if'"))?;
        let then = node.get(THEN);
        let otherwise = node.get(ELSE);
        if then.is_none() && otherwise.is_none() {
            return Err(error("expecting at least one of 'then' or 'else'"));
        }
        let branch = |name: &str, node: Option<&Yaml>| -> ConfigResult<Option<Mapping>> {
            match node {
                None => Ok(None),
                Some(Yaml::Mapping(map)) if map.len() == 1 => Ok(Some(map.clone())),
                Some(_) => Err(error(&format!("'{}' must have exactly one child", name))),
            }
        };
        let then = branch(THEN, then)?;
        let otherwise = branch(ELSE, otherwise)?;
        if let (Some(a), Some(b)) = (&then, &otherwise) {
            let keys = |m: &Mapping| m.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>();
            if keys(a) != keys(b) {
                return Err(error("'then' and 'else' must have the same key"));
            }
        }
        let truth = self.truth(test)?;
        trace!("condition {} is {}", path, truth);
        Ok(if truth { then } else { otherwise })
    }

    fn truth(&self, test: &Yaml) -> ConfigResult<bool> {
        Ok(match test {
            Yaml::Bool(b) => *b,
            Yaml::String(s) => self.serializer().parse_object(s)?.is_truthy(),
            other => Value::from_yaml(other).is_truthy(),
        })
    }
}

fn join(path: &str, part: &str) -> String {
    if path.is_empty() {
        part.to_string()
    } else {
        format!("{}.{}", path, part)
    }
}

impl Configurable for ConditionalYamlConfig {
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
        self.yaml.source_files()
    }

    fn resolve_imports(&mut self, context: &ImportContext) -> ConfigResult<()> {
        if self.evaluated {
            return Ok(());
        }
        self.yaml.resolve_imports(context)?;
        self.unevaluated = self.yaml.yaml().tree().clone();
        let tree = self.evaluate(&self.unevaluated, "")?;
        debug!("evaluated conditions of {}", self.origin());
        self.yaml.set_tree(tree)?;
        self.evaluated = true;
        Ok(())
    }
}
