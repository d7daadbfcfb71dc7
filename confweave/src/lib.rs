//! Layered configuration composition
//!
//! This crate builds one section/option store out of many sources: INI,
//! YAML and JSON files, in-memory dictionaries, the process environment and
//! command line override strings. An `import` section in the root file names
//! the sources to load; their values are merged in order and may refer to
//! each other with `${section:option}` references.
//!
//! # Features
//!
//! - **Import engine**: [`ImportIniConfig`] loads files and descriptor
//!   sections, merges them and removes the helper sections afterwards
//! - **Cross-source interpolation**: `${option}`, `${section:option}` and the
//!   `$$` escape resolve against every loaded source
//! - **Typed values**: the [`Serializer`] turns strings such as `list: a, b`
//!   or `path: ~/data` into [`Value`]s and back
//! - **Conditional YAML**: `condition` nodes choose between branches
//! - **Modification time cache**: [`CachedImportConfig`] skips the import
//!   while no source file changed
//! - **Object graphs**: [`InstanceFactory`] creates objects from sections that
//!   reference each other with `instance: <section>`
//!
//! # Quick Start
//!
//! ```no_run
//! use confweave::{Configurable, ImportIniConfig};
//!
//! let config = ImportIniConfig::open("app.conf")?;
//! let host = config.get_option("host", Some("db"))?;
//! let port = config.get_option_object("port", Some("db"))?;
//! println!("{}:{}", host, port);
//! # Ok::<(), confweave::ConfigError>(())
//! ```
//!
//! ## Example import file
//!
//! ```ini
//! [import]
//! references = list: paths
//! sections = list: db_cli, overrides
//!
//! [paths]
//! conf = /etc/app
//!
//! [db_cli]
//! type = ini
//! config_file = path: ${paths:conf}/db.conf
//!
//! [overrides]
//! config_files = list: ${paths:conf}/local.yml, ${paths:conf}/site.json
//!
//! [app]
//! url = pg://${db:host}:${db:port}
//! ```

/// Modification time cache of merged imports
pub mod cache;
/// YAML with conditional branches
pub mod condyaml;
/// The section/option store trait
pub mod configurable;
/// Read-only in-memory store
pub mod dict;
/// Process environment store
pub mod env;
/// Error types and handling
pub mod error;
/// Store construction from descriptors, types and paths
pub mod factory;
/// Composition of many sources into one store
pub mod import;
/// INI backed store
pub mod ini;
/// Objects created from sections
pub mod instance;
/// `${section:option}` reference resolution
pub mod interpolate;
/// JSON backed store
pub mod json;
/// Overrides applied over a finished store
pub mod overrider;
/// Typed value parsing and formatting
pub mod serial;
/// Store parsed from `section.key=value` literals
pub mod string;
/// Typed option values
pub mod value;
/// INI and JSON rendering
pub mod writer;
/// YAML backed store
pub mod yaml;

pub use cache::{CachedImportConfig, ConfigCache};
pub use condyaml::ConditionalYamlConfig;
pub use configurable::{
    Configurable, CopyOptions, CopyReport, ReadMode, Section, Sections, DEFAULT_SECTION,
};
pub use dict::DictionaryConfig;
pub use env::EnvironmentConfig;
pub use error::{ConfigError, ConfigResult};
pub use factory::{ConfigurableFactory, LoaderParams};
pub use import::{
    ImportContext, ImportIniConfig, ImportSource, ImportTreeConfig, ImportYamlConfig, LoadState,
};
pub use ini::IniConfig;
pub use instance::{Arg, Instance, InstanceArgs, InstanceFactory};
pub use json::JsonConfig;
pub use overrider::apply_overrides;
pub use serial::Serializer;
pub use string::StringConfig;
pub use value::{Settings, Value};
pub use yaml::YamlConfig;

#[cfg(test)]
mod tests;
