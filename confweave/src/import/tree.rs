//! Import of whole file trees from a single descriptor

use super::{
    ImportContext, ImportIniConfig, CLEANUPS_NAME, CONFIG_FILE, CONFIG_FILES, ENABLED_NAME,
    IMPORT_SECTION, REFERENCES_NAME, SECTIONS_NAME,
};
use crate::configurable::{Configurable, ReadMode, Section, Sections};
use crate::factory::{ConfigurableFactory, TYPE_MAP, TYPE_NAME};
use crate::ini::IniConfig;
use crate::{ConfigError, ConfigResult, Serializer};
use std::path::PathBuf;
use tracing::debug;

/// Extension overrides applied when the descriptor gives none
pub const DEFAULT_TREE_TYPE_MAP: &str = r#"json: {"yml": "condyaml", "conf": "importini"}"#;

const TREE_OPTIONS: [&str; 7] = [
    CONFIG_FILES,
    CONFIG_FILE,
    REFERENCES_NAME,
    CLEANUPS_NAME,
    TYPE_MAP,
    ENABLED_NAME,
    TYPE_NAME,
];

/// Loads every file of a descriptor through a synthesized import section
///
/// The descriptor section itself is reported as pending cleanup so the
/// enclosing import removes it along with any `cleanups` it names.
#[derive(Debug)]
pub struct ImportTreeConfig {
    parent_section: String,
    sections: Sections,
    cleanups: Vec<String>,
    factory: ConfigurableFactory,
    store: IniConfig,
    loaded: bool,
}

impl ImportTreeConfig {
    /// Build the import for the descriptor `body` found in `parent_section`
    ///
    /// `factory` loads the listed files, and its serializer reads `cleanups`.
    pub fn new(
        parent_section: impl Into<String>,
        body: Section,
        factory: ConfigurableFactory,
    ) -> ConfigResult<Self> {
        let parent_section = parent_section.into();
        if let Some(option) = body.keys().find(|k| !TREE_OPTIONS.contains(&k.as_str())) {
            return Err(ConfigError::UnexpectedOption {
                loader: "import tree".to_string(),
                section: parent_section,
                option: option.clone(),
            });
        }

        let mut files: Vec<String> = Vec::new();
        for key in [CONFIG_FILE, CONFIG_FILES] {
            if let Some(raw) = body.get(key) {
                files.extend(
                    raw.lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string),
                );
            }
        }
        if files.is_empty() {
            return Err(ConfigError::invalid(format!(
                "section '{}' imports a tree without '{}'",
                parent_section, CONFIG_FILES
            )));
        }
        let files = serde_json::to_string(&files).map_err(|source| ConfigError::Json {
            origin: parent_section.clone(),
            source,
        })?;

        let tree_section = format!("{}_import_tree", parent_section);
        let mut import = Section::new();
        import.insert(SECTIONS_NAME.to_string(), format!("list: {}", tree_section));
        let mut cleanups = Vec::new();
        if let Some(references) = body.get(REFERENCES_NAME) {
            import.insert(REFERENCES_NAME.to_string(), references.clone());
        }
        if let Some(raw) = body.get(CLEANUPS_NAME) {
            import.insert(CLEANUPS_NAME.to_string(), raw.clone());
            cleanups = factory.serializer().parse_names(raw)?;
        }

        let mut descriptor = Section::new();
        descriptor.insert(
            CONFIG_FILES.to_string(),
            format!("json: {}", files),
        );
        descriptor.insert(
            TYPE_MAP.to_string(),
            body.get(TYPE_MAP)
                .cloned()
                .unwrap_or_else(|| DEFAULT_TREE_TYPE_MAP.to_string()),
        );
        if let Some(enabled) = body.get(ENABLED_NAME) {
            descriptor.insert(ENABLED_NAME.to_string(), enabled.clone());
        }

        let mut sections = Sections::new();
        sections.insert(IMPORT_SECTION.to_string(), import);
        sections.insert(tree_section, descriptor);
        debug!("import tree for [{}]: {:?}", parent_section, sections);
        Ok(Self {
            store: IniConfig::from_sections(parent_section.clone(), Sections::new())
                .with_serializer(factory.serializer().clone()),
            parent_section,
            sections,
            cleanups,
            factory,
            loaded: false,
        })
    }

    /// The synthesized import sections
    pub fn import_sections(&self) -> &Sections {
        &self.sections
    }
}

impl Configurable for ImportTreeConfig {
    fn origin(&self) -> String {
        format!("import tree [{}]", self.parent_section)
    }

    fn sections(&self) -> Vec<String> {
        self.store.sections()
    }

    fn options(&self, section: &str, mode: ReadMode) -> ConfigResult<Section> {
        self.store.options(section, mode)
    }

    fn set_option(&mut self, section: &str, option: &str, value: &str) -> ConfigResult<()> {
        self.store.set_option(section, option, value)
    }

    fn remove_section(&mut self, section: &str) -> ConfigResult<bool> {
        self.store.remove_section(section)
    }

    fn default_section(&self) -> &str {
        self.store.default_section()
    }

    fn serializer(&self) -> &Serializer {
        self.factory.serializer()
    }

    fn source_files(&self) -> Vec<PathBuf> {
        self.store.source_files()
    }

    fn interpolates(&self) -> bool {
        true
    }

    fn fallback(&self) -> Option<&Sections> {
        self.store.fallback()
    }

    fn pending_cleanups(&self) -> Vec<String> {
        let mut cleanups = vec![self.parent_section.clone()];
        cleanups.extend(self.cleanups.iter().cloned());
        cleanups
    }

    fn resolve_imports(&mut self, context: &ImportContext) -> ConfigResult<()> {
        if self.loaded {
            return Ok(());
        }
        let mut import = ImportIniConfig::from_sections(self.origin(), self.sections.clone())
            .factory(self.factory.clone())
            .context(context.clone());
        import.load()?;
        let files = import.source_files();
        self.store = import.into_store().with_source_files(files);
        self.loaded = true;
        Ok(())
    }
}
