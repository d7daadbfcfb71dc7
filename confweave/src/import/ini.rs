//! INI driven import engine
//!
//! One [`ImportIniConfig::load`] runs through [`LoadState`]:
//!
//! 1. **Bootstrapping** reads only the import-control section and the
//!    sections it names, since the list of sources may depend on values in
//!    those sections.
//! 2. **Resolving children** creates one store per imported file and per
//!    descriptor section, in declaration order. Every child sees the values
//!    loaded before it, and nested imports receive them as their
//!    [`ImportContext`].
//! 3. **Merging** copies the children into one interpolating store. Options
//!    written in the importing file itself are kept; among children the last
//!    one wins. Every value is then resolved once so broken references fail
//!    here instead of on first read.
//! 4. **Cleaning up** removes the import-control, descriptor and `cleanups`
//!    sections. Their values remain available to references.

use super::{
    is_enabled, overlay, ImportContext, CLEANUPS_NAME, CONFIG_FILE, CONFIG_FILES, ENABLED_NAME,
    IMPORT_SECTION, IMPORT_SECTION_FIELDS, REFERENCES_NAME, SECTIONS_NAME,
};
use crate::configurable::{
    Configurable, CopyReport, ReadMode, Section, Sections, DEFAULT_SECTION,
};
use crate::dict::DictionaryConfig;
use crate::factory::{ConfigurableFactory, TYPE_MAP, TYPE_NAME};
use crate::ini::IniConfig;
use crate::interpolate;
use crate::{ConfigError, ConfigResult, Serializer};
use indexmap::IndexSet;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Descriptor option naming the import template section for `type = import`
const TEMPLATE_SECTION_NAME: &str = "section";

const TREE_TYPE: &str = "importtree";

/// Where the importing configuration is read from
#[derive(Debug, Clone)]
pub enum ImportSource {
    /// An INI file or a directory of them
    Path(PathBuf),
    /// INI text
    Text { origin: String, text: String },
    /// Already parsed sections
    Sections { origin: String, sections: Sections },
}

impl ImportSource {
    fn origin(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Text { origin, .. } | Self::Sections { origin, .. } => origin.clone(),
        }
    }

    fn read(&self) -> ConfigResult<IniConfig> {
        match self {
            Self::Path(path) => {
                if !path.exists() {
                    return Err(ConfigError::file_not_found(path));
                }
                IniConfig::from_path(path)
            }
            Self::Text { origin, text } => IniConfig::parse(origin.clone(), text),
            Self::Sections { origin, sections } => {
                Ok(IniConfig::from_sections(origin.clone(), sections.clone()))
            }
        }
    }
}

/// Progress of an [`ImportIniConfig::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Uninitialized,
    Bootstrapping,
    ResolvingChildren,
    Merging,
    CleaningUp,
    Ready,
    Failed,
}

/// A configuration that loads other configurations named in its import section
#[derive(Debug)]
pub struct ImportIniConfig {
    source: ImportSource,
    config_section: String,
    exclude_config_sections: bool,
    default_section: String,
    robust: bool,
    factory: ConfigurableFactory,
    context: ImportContext,
    state: LoadState,
    store: IniConfig,
    pending_cleanups: Vec<String>,
    files: Vec<PathBuf>,
    captured: Option<Vec<PathBuf>>,
    report: CopyReport,
}

impl ImportIniConfig {
    pub fn new(source: ImportSource) -> Self {
        Self {
            store: IniConfig::from_sections(source.origin(), Sections::new()),
            source,
            config_section: IMPORT_SECTION.to_string(),
            exclude_config_sections: true,
            default_section: DEFAULT_SECTION.to_string(),
            robust: false,
            factory: ConfigurableFactory::default(),
            context: ImportContext::default(),
            state: LoadState::Uninitialized,
            pending_cleanups: Vec::new(),
            files: Vec::new(),
            captured: None,
            report: CopyReport::default(),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(ImportSource::Path(path.into()))
    }

    pub fn from_text(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(ImportSource::Text {
            origin: origin.into(),
            text: text.into(),
        })
    }

    pub fn from_sections(origin: impl Into<String>, sections: Sections) -> Self {
        Self::new(ImportSource::Sections {
            origin: origin.into(),
            sections,
        })
    }

    /// Build and load an import file with default settings
    pub fn open(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let mut config = Self::from_path(path.as_ref());
        config.load()?;
        Ok(config)
    }

    /// Name of the import-control section
    pub fn config_section(mut self, section: impl Into<String>) -> Self {
        self.config_section = section.into();
        self
    }

    /// Remove the import-control, descriptor and cleanup sections after loading
    pub fn exclude_config_sections(mut self, exclude: bool) -> Self {
        self.exclude_config_sections = exclude;
        self
    }

    pub fn default_section(mut self, section: impl Into<String>) -> Self {
        self.default_section = section.into();
        self
    }

    /// Drop sections that fail to resolve instead of failing the load
    pub fn robust(mut self, robust: bool) -> Self {
        self.robust = robust;
        self
    }

    pub fn factory(mut self, factory: ConfigurableFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Values from enclosing imports available to references
    pub fn context(mut self, context: ImportContext) -> Self {
        self.context = context;
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Sections dropped by robust loading and the last failure
    pub fn report(&self) -> &CopyReport {
        &self.report
    }

    /// The merged store
    pub fn store(&self) -> &IniConfig {
        &self.store
    }

    pub fn into_store(self) -> IniConfig {
        self.store
    }

    /// Begin recording the files read by the next load
    pub fn start_file_capture(&mut self) {
        self.captured = Some(Vec::new());
    }

    /// Stop recording and return every file read while capturing
    pub fn stop_file_capture(&mut self) -> Vec<PathBuf> {
        self.captured.take().unwrap_or_default()
    }

    /// Run the import, replacing any previously loaded values
    pub fn load(&mut self) -> ConfigResult<()> {
        info!("importing {}", self.source.origin());
        self.report = CopyReport::default();
        match self.run() {
            Ok(store) => {
                self.store = store;
                self.transition(LoadState::Ready);
                if let Some(captured) = &mut self.captured {
                    captured.extend(self.files.iter().cloned());
                }
                Ok(())
            }
            Err(err) => {
                self.transition(LoadState::Failed);
                Err(err)
            }
        }
    }

    fn transition(&mut self, state: LoadState) {
        debug!("{}: {:?} -> {:?}", self.source.origin(), self.state, state);
        self.state = state;
    }

    fn serializer(&self) -> &Serializer {
        self.factory.serializer()
    }

    fn run(&mut self) -> ConfigResult<IniConfig> {
        self.transition(LoadState::Bootstrapping);
        if self.exclude_config_sections && self.default_section == self.config_section {
            return Err(ConfigError::invalid(format!(
                "exclude_config_sections must be off when the import and default section are both '{}'",
                self.config_section
            )));
        }
        let root = self.source.read()?;
        self.files = root.source_files();
        let mut bootstrap = self.bootstrap(&root)?;
        self.validate(&bootstrap)?;

        self.transition(LoadState::ResolvingChildren);
        let conf_sec = self.config_section.clone();
        let mut config_sections: IndexSet<String> = IndexSet::from([conf_sec.clone()]);
        let mut children: Vec<Box<dyn Configurable>> = Vec::new();
        if bootstrap.has_section(&conf_sec) && self.import_enabled(&bootstrap)? {
            let type_map = bootstrap.option(&conf_sec, TYPE_MAP, ReadMode::Interpolated)?;
            let mut files = Vec::new();
            if let Some(file) = bootstrap.option(&conf_sec, CONFIG_FILE, ReadMode::Interpolated)? {
                files.push(file);
            } else if let Some(raw) = bootstrap.option(&conf_sec, CONFIG_FILES, ReadMode::Interpolated)? {
                files.extend(self.serializer().parse_names(&raw)?);
            }
            for file in files {
                let mut params = Section::new();
                params.insert(CONFIG_FILE.to_string(), file);
                if let Some(type_map) = &type_map {
                    params.insert(TYPE_MAP.to_string(), type_map.clone());
                }
                self.create_configs(&conf_sec, params, &mut bootstrap, &mut children)?;
            }
            if let Some(raw) = bootstrap.option(&conf_sec, SECTIONS_NAME, ReadMode::Interpolated)? {
                for section in self.serializer().parse_names(&raw)? {
                    trace!("populating section '{}'", section);
                    let params = bootstrap.get_options(&section)?;
                    config_sections.insert(section.clone());
                    self.create_configs(&section, params, &mut bootstrap, &mut children)?;
                }
            }
            if let Some(raw) = bootstrap.option(&conf_sec, CLEANUPS_NAME, ReadMode::Interpolated)? {
                config_sections.extend(self.serializer().parse_names(&raw)?);
            }
        }

        self.transition(LoadState::Merging);
        let mut removals: IndexSet<String> = IndexSet::new();
        for child in &children {
            removals.extend(child.pending_cleanups());
        }
        self.pending_cleanups = removals.iter().cloned().collect();
        if self.exclude_config_sections {
            removals.extend(config_sections);
        }
        let mut store = self.merge(&root, &bootstrap, &children)?;
        self.resolve_all(&mut store, &removals)?;

        self.transition(LoadState::CleaningUp);
        for section in &removals {
            if let Ok(options) = store.options(section, ReadMode::Raw) {
                store
                    .fallback_mut()
                    .entry(section.clone())
                    .or_default()
                    .extend(options);
            }
            if store.remove_section(section)? {
                debug!("removed section [{}]", section);
            }
        }
        self.report.copied = store.sections();
        Ok(store)
    }

    /// The root's import-control section, the sections it loads and references
    fn bootstrap(&self, root: &IniConfig) -> ConfigResult<IniConfig> {
        let conf_sec = &self.config_section;
        let inherited = self.context.sections().clone();
        let full = root
            .clone()
            .with_interpolation(true)
            .with_fallback(inherited.clone());
        let mut keep: Option<IndexSet<String>> = None;
        if full.has_section(conf_sec) {
            let sections = full.option(conf_sec, SECTIONS_NAME, ReadMode::Interpolated)?;
            let references = full.option(conf_sec, REFERENCES_NAME, ReadMode::Interpolated)?;
            if sections.is_some() || references.is_some() {
                let mut names = IndexSet::from([conf_sec.clone()]);
                for raw in [sections, references].into_iter().flatten() {
                    names.extend(self.serializer().parse_names(&raw)?);
                }
                keep = Some(names);
            }
        }
        let sections: Sections = root
            .raw_sections()
            .iter()
            .filter(|(name, _)| keep.as_ref().map_or(true, |keep| keep.contains(*name)))
            .map(|(name, options)| (name.clone(), options.clone()))
            .collect();
        debug!("bootstrap sections: {:?}", sections.keys());
        Ok(IniConfig::from_sections(format!("{} (bootstrap)", root.origin()), sections)
            .with_interpolation(true)
            .with_fallback(inherited)
            .with_default_section(self.default_section.clone())
            .with_serializer(self.serializer().clone()))
    }

    /// Reject import sections with unknown options or dangling references
    fn validate(&self, bootstrap: &IniConfig) -> ConfigResult<()> {
        let conf_sec = &self.config_section;
        if !bootstrap.has_section(conf_sec) {
            return Ok(());
        }
        let options = bootstrap.options(conf_sec, ReadMode::Raw)?;
        let aliens: Vec<String> = options
            .keys()
            .filter(|k| !IMPORT_SECTION_FIELDS.contains(&k.as_str()))
            .map(|k| format!("'{}'", k))
            .collect();
        if !aliens.is_empty() {
            return Err(ConfigError::InvalidImportOptions {
                section: conf_sec.clone(),
                options: aliens.join(", "),
            });
        }
        if options.contains_key(CONFIG_FILE) && options.contains_key(CONFIG_FILES) {
            return Err(ConfigError::ConflictingImportFiles {
                section: conf_sec.clone(),
            });
        }
        if let Some(raw) = bootstrap.option(conf_sec, REFERENCES_NAME, ReadMode::Interpolated)? {
            for reference in self.serializer().parse_names(&raw)? {
                if !bootstrap.has_section(&reference) && !self.context.has_section(&reference) {
                    return Err(ConfigError::MissingReference {
                        section: conf_sec.clone(),
                        reference,
                    });
                }
            }
        }
        Ok(())
    }

    fn import_enabled(&self, bootstrap: &IniConfig) -> ConfigResult<bool> {
        let raw = bootstrap.option(&self.config_section, ENABLED_NAME, ReadMode::Interpolated)?;
        let enabled = is_enabled(raw.as_deref(), self.serializer(), |section, option| {
            lookup(bootstrap, section, option)
        })?;
        if !enabled {
            info!("imports of [{}] are disabled", self.config_section);
        }
        Ok(enabled)
    }

    /// Create one child per file of a descriptor, or one for the descriptor
    fn create_configs(
        &mut self,
        section: &str,
        mut params: Section,
        bootstrap: &mut IniConfig,
        children: &mut Vec<Box<dyn Configurable>>,
    ) -> ConfigResult<()> {
        debug!("creating configs from section: [{}]", section);
        let mut created = Vec::new();
        // an import tree takes the whole file list
        let files = if params.get(TYPE_NAME).map(String::as_str) == Some(TREE_TYPE) {
            None
        } else {
            params.shift_remove(CONFIG_FILES)
        };
        match files {
            None => created.push(self.create_config(section, params, bootstrap)?),
            Some(raw) => {
                for file in self.serializer().parse_names(&raw)? {
                    // entries substituted to nothing are skipped
                    if file == "None" {
                        continue;
                    }
                    let mut single = params.clone();
                    single.insert(CONFIG_FILE.to_string(), file);
                    created.push(self.create_config(section, single, bootstrap)?);
                }
            }
        }
        for mut config in created {
            let mut context = self.context.clone();
            context.absorb(&*bootstrap)?;
            config.resolve_imports(&context)?;
            if let Some(fallback) = config.fallback() {
                overlay(bootstrap.fallback_mut(), fallback);
            }
            for name in config.sections() {
                for (option, value) in config.options(&name, ReadMode::Raw)? {
                    bootstrap.set_option(&name, &option, &interpolate::escape_stray(&value))?;
                }
            }
            self.files.extend(config.source_files());
            children.push(config);
        }
        Ok(())
    }

    fn create_config(
        &self,
        section: &str,
        mut params: Section,
        bootstrap: &IniConfig,
    ) -> ConfigResult<Box<dyn Configurable>> {
        let enabled = params.shift_remove(ENABLED_NAME);
        let enabled = is_enabled(enabled.as_deref(), self.serializer(), |sec, opt| {
            lookup(bootstrap, sec, opt)
        })?;
        if !enabled {
            info!("skipping disabled import [{}]", section);
            return Ok(Box::new(DictionaryConfig::empty()));
        }
        let is_template = params.get(TYPE_NAME).map(String::as_str) == Some("import")
            && !params.contains_key(CONFIG_FILE);
        if is_template {
            return self.create_template_import(section, params, bootstrap);
        }
        self.factory.from_section(&params, section)
    }

    /// `type = import` with `section = <name>`: a nested import whose control
    /// section is `<name>` in this import's bootstrap values
    fn create_template_import(
        &self,
        section: &str,
        mut params: Section,
        bootstrap: &IniConfig,
    ) -> ConfigResult<Box<dyn Configurable>> {
        params.shift_remove(TYPE_NAME);
        let template = params.shift_remove(TEMPLATE_SECTION_NAME).ok_or_else(|| {
            ConfigError::invalid(format!(
                "section '{}' has 'type = import' without a '{}' or '{}'",
                section, CONFIG_FILE, TEMPLATE_SECTION_NAME
            ))
        })?;
        if let Some(option) = params.keys().next() {
            return Err(ConfigError::UnexpectedOption {
                loader: "import template".to_string(),
                section: section.to_string(),
                option: option.clone(),
            });
        }
        if !bootstrap.has_section(&template) {
            return Err(ConfigError::MissingReference {
                section: section.to_string(),
                reference: template,
            });
        }
        debug!("importing with template section [{}]", template);
        let nested = ImportIniConfig::from_sections(
            format!("{} [{}]", self.source.origin(), template),
            bootstrap.raw_sections().clone(),
        )
        .config_section(template)
        .default_section(self.default_section.clone())
        .robust(self.robust)
        .factory(self.factory.clone());
        Ok(Box::new(nested))
    }

    /// Copy the root and every child into one interpolating store
    fn merge(
        &mut self,
        root: &IniConfig,
        bootstrap: &IniConfig,
        children: &[Box<dyn Configurable>],
    ) -> ConfigResult<IniConfig> {
        let root_keys: HashSet<(String, String)> = root
            .raw_sections()
            .iter()
            .flat_map(|(section, options)| {
                options.keys().map(move |k| (section.clone(), k.clone()))
            })
            .collect();
        let mut store = IniConfig::from_sections(root.origin(), root.raw_sections().clone())
            .with_interpolation(true)
            .with_default_section(self.default_section.clone())
            .with_serializer(self.serializer().clone())
            .with_source_files(self.files.clone());
        for child in children {
            debug!("loading configuration {} -> {}", child.origin(), root.origin());
            let resolved = child.interpolates();
            for section in child.sections() {
                let options = match child.options(&section, ReadMode::Interpolated) {
                    Ok(options) => options,
                    Err(err) if self.robust => {
                        warn!("could not populate {}:[{}]: {}", child.origin(), section, err);
                        self.report.dropped.push(section);
                        self.report.last_error = Some(err);
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                for (option, value) in options {
                    if root_keys.contains(&(section.clone(), option.clone())) {
                        trace!("keeping root value of {}:{}", section, option);
                        continue;
                    }
                    store.set_option(&section, &option, &interpolate::for_target(&value, resolved))?;
                }
            }
        }
        let mut fallback = bootstrap.fallback().cloned().unwrap_or_default();
        overlay(&mut fallback, bootstrap.raw_sections());
        *store.fallback_mut() = fallback;
        debug!("imported {} children into {}", children.len(), root.origin());
        Ok(store)
    }

    /// Resolve every value of every kept section once
    fn resolve_all(&mut self, store: &mut IniConfig, skip: &IndexSet<String>) -> ConfigResult<()> {
        loop {
            let mut failed = Vec::new();
            for section in store.sections() {
                if skip.contains(&section) {
                    continue;
                }
                if let Err(err) = store.options(&section, ReadMode::Interpolated) {
                    if !self.robust {
                        return Err(err);
                    }
                    failed.push((section, err));
                }
            }
            if failed.is_empty() {
                return Ok(());
            }
            for (section, err) in failed {
                self.report.drop_section(store, section, err);
            }
        }
    }
}

fn lookup(config: &IniConfig, section: &str, option: &str) -> ConfigResult<Option<String>> {
    if config.has_section(section) {
        config.option(section, option, ReadMode::Interpolated)
    } else {
        Ok(None)
    }
}

impl Configurable for ImportIniConfig {
    fn origin(&self) -> String {
        self.source.origin()
    }

    fn sections(&self) -> Vec<String> {
        self.store.sections()
    }

    fn options(&self, section: &str, mode: ReadMode) -> ConfigResult<Section> {
        self.store.options(section, mode)
    }

    fn option(&self, section: &str, option: &str, mode: ReadMode) -> ConfigResult<Option<String>> {
        self.store.option(section, option, mode)
    }

    fn set_option(&mut self, section: &str, option: &str, value: &str) -> ConfigResult<()> {
        self.store.set_option(section, option, value)
    }

    fn remove_section(&mut self, section: &str) -> ConfigResult<bool> {
        self.store.remove_section(section)
    }

    fn default_section(&self) -> &str {
        &self.default_section
    }

    fn serializer(&self) -> &Serializer {
        self.factory.serializer()
    }

    fn source_files(&self) -> Vec<PathBuf> {
        self.files.clone()
    }

    fn interpolates(&self) -> bool {
        true
    }

    fn fallback(&self) -> Option<&Sections> {
        self.store.fallback()
    }

    fn pending_cleanups(&self) -> Vec<String> {
        self.pending_cleanups.clone()
    }

    fn resolve_imports(&mut self, context: &ImportContext) -> ConfigResult<()> {
        if self.state != LoadState::Uninitialized {
            return Ok(());
        }
        overlay(&mut self.context.sections, context.sections());
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_db_cli_scenario() {
        let dir = TempDir::new().unwrap();
        let db = write(&dir, "db.conf", "[db]\nhost = localhost\n");
        let root = write(
            &dir,
            "app.conf",
            &format!(
                "[import]\nsections = list: db_cli\n\n[db_cli]\ntype = ini\nconfig_file = path: {}\n",
                db.display()
            ),
        );
        let config = ImportIniConfig::open(&root).unwrap();
        assert_eq!(config.state(), LoadState::Ready);
        let options = config.get_options("db").unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options["host"], "localhost");
        assert!(!config.has_section("import"));
        assert!(!config.has_section("db_cli"));
        assert_eq!(config.source_files(), vec![root, db]);
    }

    #[test]
    fn test_references_feed_descriptors() {
        let dir = TempDir::new().unwrap();
        write(&dir, "db.conf", "[db]\nport = 5432\n");
        let root = format!(
            "[import]\nreferences = list: paths\nsections = list: db_imp\n\n\
             [paths]\nconf_dir = {}\n\n\
             [db_imp]\nconfig_file = path: ${{paths:conf_dir}}/db.conf\n\n\
             [app]\nurl = pg://localhost:${{db:port}}\n",
            dir.path().display()
        );
        let mut config = ImportIniConfig::from_text("root", root);
        config.load().unwrap();
        assert_eq!(config.get_option("url", Some("app")).unwrap(), "pg://localhost:5432");
        assert!(config.has_section("paths"));
    }

    #[test]
    fn test_invalid_import_section() {
        let mut config = ImportIniConfig::from_text("root", "[import]\nsections = list: a\nbogus = 1\n[a]\ntype = ini\n");
        let err = config.load().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidImportOptions { ref options, .. } if options == "'bogus'"));
        assert_eq!(config.state(), LoadState::Failed);

        let mut config = ImportIniConfig::from_text("root", "[import]\nreferences = list: missing\n");
        assert!(matches!(
            config.load(),
            Err(ConfigError::MissingReference { ref reference, .. }) if reference == "missing"
        ));

        let mut config =
            ImportIniConfig::from_text("root", "[import]\nconfig_file = a.conf\nconfig_files = list: b.conf\n");
        assert!(matches!(config.load(), Err(ConfigError::ConflictingImportFiles { .. })));
    }

    #[test]
    fn test_import_section_as_default_needs_inclusion() {
        let mut config = ImportIniConfig::from_text("root", "[import]\n").default_section("import");
        assert!(matches!(config.load(), Err(ConfigError::InvalidConfiguration { .. })));

        let mut config = ImportIniConfig::from_text("root", "[import]\n")
            .default_section("import")
            .exclude_config_sections(false);
        config.load().unwrap();
        assert!(config.has_section("import"));
    }

    #[test]
    fn test_disabled_descriptor_and_import() {
        let dir = TempDir::new().unwrap();
        let db = write(&dir, "db.conf", "[db]\nhost = localhost\n");
        let root = format!(
            "[import]\nreferences = list: flags\nsections = list: db_imp\n\n[flags]\nuse_db = False\n\n\
             [db_imp]\nenabled = flags:use_db\nconfig_file = {}\n",
            db.display()
        );
        let mut config = ImportIniConfig::from_text("root", root);
        config.load().unwrap();
        assert!(!config.has_section("db"));

        let root = format!(
            "[import]\nenabled = False\nconfig_file = {}\n",
            db.display()
        );
        let mut config = ImportIniConfig::from_text("root", root);
        config.load().unwrap();
        assert!(config.sections().is_empty());
    }

    #[test]
    fn test_template_import() {
        let dir = TempDir::new().unwrap();
        let db = write(&dir, "db.conf", "[db]\nhost = localhost\n");
        let root = format!(
            "[import]\nreferences = list: db_template\nsections = list: tmpl_imp\n\n\
             [tmpl_imp]\ntype = import\nsection = db_template\n\n\
             [db_template]\nconfig_files = list: {}\n",
            db.display()
        );
        let mut config = ImportIniConfig::from_text("root", root);
        config.load().unwrap();
        assert_eq!(config.get_option("host", Some("db")).unwrap(), "localhost");
        assert!(!config.has_section("tmpl_imp"));
    }

    #[test]
    fn test_file_capture() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.conf", "[a]\nx = 1\n");
        let b = write(&dir, "b.json", r#"{"b": {"y": 2}}"#);
        let root = write(
            &dir,
            "root.conf",
            &format!("[import]\nconfig_files = list: {}, {}\n", a.display(), b.display()),
        );
        let mut config = ImportIniConfig::from_path(&root);
        config.start_file_capture();
        config.load().unwrap();
        assert_eq!(config.stop_file_capture(), vec![root, a, b]);
        assert!(config.stop_file_capture().is_empty());
    }
}
