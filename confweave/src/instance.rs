//! Object graphs described by configuration sections
//!
//! A section names its constructor with `class_name`; its other options
//! become constructor arguments. Option values with these prefixes are
//! resolved before the constructor runs:
//!
//! | Value | Argument |
//! |-------|----------|
//! | `instance: <section>` | the object of `<section>`, created once and shared |
//! | `call: <section>` | a new object of `<section>` for every use |
//! | `object: <name>` | the constructor `<name>` called with no arguments |
//! | `alias: <section>:<option>` | the argument `<section>:<option>` resolves to |
//!
//! Anything else is parsed by the store's [`Serializer`](crate::Serializer).

use crate::configurable::{Configurable, ReadMode};
use crate::factory::CLASS_NAME;
use crate::interpolate::MAX_INTERPOLATION_DEPTH;
use crate::{ConfigError, ConfigResult, Value};
use indexmap::IndexMap;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A constructed object
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Builds an object from its resolved arguments
pub type InstanceConstructor = Arc<dyn Fn(&InstanceArgs) -> ConfigResult<Instance> + Send + Sync>;

/// A resolved constructor argument
#[derive(Clone)]
pub enum Arg {
    Value(Value),
    Instance(Instance),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// Arguments handed to an [`InstanceConstructor`]
#[derive(Debug, Clone)]
pub struct InstanceArgs {
    section: String,
    args: IndexMap<String, Arg>,
}

impl InstanceArgs {
    fn new(section: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            args: IndexMap::new(),
        }
    }

    /// Section the object is created from
    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.args.keys()
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.args.get(name)
    }

    /// A plain value argument
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.args.get(name)? {
            Arg::Value(value) => Some(value),
            Arg::Instance(_) => None,
        }
    }

    /// A plain value argument that must be present
    pub fn require(&self, name: &str) -> ConfigResult<&Value> {
        self.value(name).ok_or_else(|| ConfigError::Instance {
            section: self.section.clone(),
            reason: format!("missing argument '{}'", name),
        })
    }

    /// An object argument of type `T`
    pub fn instance<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.args.get(name)? {
            Arg::Instance(instance) => instance.clone().downcast::<T>().ok(),
            Arg::Value(_) => None,
        }
    }
}

/// Creates objects from sections using registered constructors
///
/// Objects referenced with `instance:` are cached by section name until
/// [`InstanceFactory::clear`] so every reference sees the same object.
#[derive(Clone, Default)]
pub struct InstanceFactory {
    registry: IndexMap<String, InstanceConstructor>,
    shared: IndexMap<String, Instance>,
}

impl fmt::Debug for InstanceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("classes", &self.registry.keys().collect::<Vec<_>>())
            .field("shared", &self.shared.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl InstanceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the constructor for `class_name`
    pub fn register<F>(mut self, class_name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&InstanceArgs) -> ConfigResult<Instance> + Send + Sync + 'static,
    {
        self.registry.insert(class_name.into(), Arc::new(constructor));
        self
    }

    /// Forget every shared object
    pub fn clear(&mut self) {
        self.shared.clear();
    }

    /// The shared object of `section`, creating it on first use
    pub fn instance(&mut self, config: &dyn Configurable, section: &str) -> ConfigResult<Instance> {
        let mut stack = Vec::new();
        self.create(config, section, &mut stack, true)
    }

    /// The shared object of `section` as a `T`
    pub fn instance_as<T: Any + Send + Sync>(
        &mut self,
        config: &dyn Configurable,
        section: &str,
    ) -> ConfigResult<Arc<T>> {
        self.instance(config, section)?
            .downcast::<T>()
            .map_err(|_| ConfigError::Instance {
                section: section.to_string(),
                reason: format!("not a {}", std::any::type_name::<T>()),
            })
    }

    fn constructor(&self, class_name: &str) -> ConfigResult<InstanceConstructor> {
        self.registry
            .get(class_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownClass {
                class_name: class_name.to_string(),
            })
    }

    fn create(
        &mut self,
        config: &dyn Configurable,
        section: &str,
        stack: &mut Vec<String>,
        share: bool,
    ) -> ConfigResult<Instance> {
        if share {
            if let Some(instance) = self.shared.get(section) {
                trace!("reusing instance of [{}]", section);
                return Ok(instance.clone());
            }
        }
        if stack.iter().any(|s| s == section) {
            stack.push(section.to_string());
            return Err(ConfigError::Instance {
                section: section.to_string(),
                reason: format!("cyclic references: {}", stack.join(" -> ")),
            });
        }
        stack.push(section.to_string());

        let mut options = config.get_options(section)?;
        let class_name = options
            .shift_remove(CLASS_NAME)
            .ok_or_else(|| ConfigError::Instance {
                section: section.to_string(),
                reason: format!("no '{}' option", CLASS_NAME),
            })?;
        let constructor = self.constructor(&class_name)?;
        let mut args = InstanceArgs::new(section);
        for (name, raw) in options {
            let arg = self.resolve(config, section, &name, &raw, stack, 0)?;
            args.args.insert(name, arg);
        }
        stack.pop();

        debug!("creating {} from [{}]", class_name, section);
        let instance = constructor(&args)?;
        if share {
            self.shared.insert(section.to_string(), instance.clone());
        }
        Ok(instance)
    }

    fn resolve(
        &mut self,
        config: &dyn Configurable,
        section: &str,
        option: &str,
        raw: &str,
        stack: &mut Vec<String>,
        depth: usize,
    ) -> ConfigResult<Arg> {
        let raw = raw.trim();
        if let Some(target) = raw.strip_prefix("instance:") {
            return Ok(Arg::Instance(self.create(config, target.trim(), stack, true)?));
        }
        if let Some(target) = raw.strip_prefix("call:") {
            return Ok(Arg::Instance(self.create(config, target.trim(), stack, false)?));
        }
        if let Some(class_name) = raw.strip_prefix("object:") {
            let class_name = class_name.trim();
            let constructor = self.constructor(class_name)?;
            return Ok(Arg::Instance(constructor(&InstanceArgs::new(class_name))?));
        }
        if let Some(target) = raw.strip_prefix("alias:") {
            if depth >= MAX_INTERPOLATION_DEPTH {
                return Err(ConfigError::Instance {
                    section: section.to_string(),
                    reason: format!("alias chain of '{}' is too deep", option),
                });
            }
            let (alias_section, alias_option) = target.trim().split_once(':').ok_or_else(|| {
                ConfigError::serialization(raw, "expecting alias: <section>:<option>")
            })?;
            let value = config
                .option(alias_section, alias_option, ReadMode::Interpolated)?
                .ok_or_else(|| ConfigError::no_such_option(alias_section, alias_option))?;
            return self.resolve(config, alias_section, alias_option, &value, stack, depth + 1);
        }
        Ok(Arg::Value(config.serializer().parse_object(raw)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ini::IniConfig;

    #[derive(Debug)]
    struct Pool {
        size: i64,
    }

    #[derive(Debug)]
    struct Database {
        url: String,
        pool: Arc<Pool>,
    }

    fn factory() -> InstanceFactory {
        InstanceFactory::new()
            .register("Pool", |args: &InstanceArgs| {
                let size = args.value("size").and_then(Value::as_int).unwrap_or(1);
                Ok(Arc::new(Pool { size }) as Instance)
            })
            .register("Database", |args: &InstanceArgs| {
                let url = args.require("url")?.to_plain_string();
                let pool = args.instance::<Pool>("pool").ok_or_else(|| ConfigError::Instance {
                    section: args.section().to_string(),
                    reason: "pool must be a Pool".to_string(),
                })?;
                Ok(Arc::new(Database { url, pool }) as Instance)
            })
    }

    fn config(text: &str) -> IniConfig {
        IniConfig::parse("t", text).unwrap().with_interpolation(true)
    }

    #[test]
    fn test_nested_instances_are_shared() {
        let config = config(
            "[pool]\nclass_name = Pool\nsize = 4\n\n\
             [db]\nclass_name = Database\nurl = pg://localhost\npool = instance: pool\n\n\
             [replica]\nclass_name = Database\nurl = alias: db:url\npool = instance: pool\n",
        );
        let mut factory = factory();
        let db = factory.instance_as::<Database>(&config, "db").unwrap();
        let replica = factory.instance_as::<Database>(&config, "replica").unwrap();
        assert_eq!(db.pool.size, 4);
        assert_eq!(replica.url, "pg://localhost");
        assert!(Arc::ptr_eq(&db.pool, &replica.pool));
        assert!(Arc::ptr_eq(
            &db,
            &factory.instance_as::<Database>(&config, "db").unwrap()
        ));
    }

    #[test]
    fn test_call_and_object_create_fresh_objects() {
        let config = config(
            "[pool]\nclass_name = Pool\n\n\
             [a]\nclass_name = Database\nurl = x\npool = call: pool\n\n\
             [b]\nclass_name = Database\nurl = y\npool = object: Pool\n",
        );
        let mut factory = factory();
        let shared = factory.instance_as::<Pool>(&config, "pool").unwrap();
        let a = factory.instance_as::<Database>(&config, "a").unwrap();
        let b = factory.instance_as::<Database>(&config, "b").unwrap();
        assert!(!Arc::ptr_eq(&shared, &a.pool));
        assert_eq!(b.pool.size, 1);
    }

    #[test]
    fn test_errors() {
        let config = config(
            "[a]\nclass_name = Database\nurl = x\npool = instance: b\n\n\
             [b]\nclass_name = Database\nurl = y\npool = instance: a\n\n\
             [c]\nclass_name = Missing\n\n[d]\nsize = 1\n",
        );
        let mut factory = factory();
        let err = factory.instance(&config, "a").unwrap_err();
        assert!(err.to_string().contains("a -> b -> a"), "{}", err);
        assert!(matches!(
            factory.instance(&config, "c"),
            Err(ConfigError::UnknownClass { .. })
        ));
        assert!(matches!(
            factory.instance(&config, "d"),
            Err(ConfigError::Instance { .. })
        ));
        assert!(matches!(
            factory.instance_as::<Pool>(&config, "missing"),
            Err(ConfigError::NoSuchSection { .. })
        ));
    }
}
