//! Building the merged configuration named on the command line

use std::path::Path;

use anyhow::{Context, Result};
use confweave::{
    apply_overrides, CachedImportConfig, ConditionalYamlConfig, ConfigCache, Configurable,
    ConfigurableFactory, ImportContext, ImportIniConfig, LoaderParams,
};

use crate::cli::Cli;

/// How the root file is read, chosen from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    /// INI with an import control section
    Import,
    /// YAML with an import node and conditions
    ConditionalYaml,
    /// Anything the factory knows how to read
    Other,
}

impl RootKind {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("conf") | Some("ini") => RootKind::Import,
            Some("yml") | Some("yaml") => RootKind::ConditionalYaml,
            _ => RootKind::Other,
        }
    }
}

/// Load `cli.config`, resolve its imports and apply the overrides
pub fn load(cli: &Cli) -> Result<Box<dyn Configurable>> {
    let factory = ConfigurableFactory::default();
    let path = cli.config.as_path();
    let kind = RootKind::of(path);
    tracing::debug!("loading {} as {:?}", path.display(), kind);

    let mut config: Box<dyn Configurable> = match kind {
        RootKind::Import => {
            let import = ImportIniConfig::from_path(path)
                .config_section(cli.config_section.as_str())
                .robust(cli.robust)
                .factory(factory.clone());
            match &cli.cache {
                Some(cache) => {
                    let mut cached = CachedImportConfig::new(ConfigCache::new(cache), import);
                    cached
                        .load()
                        .with_context(|| format!("loading {}", path.display()))?;
                    tracing::debug!("cache hit: {}", cached.from_cache());
                    Box::new(cached)
                }
                None => {
                    let mut import = import;
                    import
                        .load()
                        .with_context(|| format!("loading {}", path.display()))?;
                    if let Some(err) = &import.report().last_error {
                        tracing::warn!(
                            "dropped sections {:?}: {}",
                            import.report().dropped,
                            err
                        );
                    }
                    Box::new(import)
                }
            }
        }
        RootKind::ConditionalYaml => {
            let mut yaml = ConditionalYamlConfig::from_path(path)?
                .import_name(cli.config_section.as_str())
                .factory(factory.clone());
            yaml.load()
                .with_context(|| format!("loading {}", path.display()))?;
            Box::new(yaml)
        }
        RootKind::Other => {
            let mut params = LoaderParams::new("root", Default::default());
            let mut config = factory.from_path(path, &mut params)?;
            params.finish(&config.origin())?;
            config
                .resolve_imports(&ImportContext::default())
                .with_context(|| format!("loading {}", path.display()))?;
            config
        }
    };

    apply_overrides(config.as_mut(), cli.overrides.as_slice(), &factory).context("applying overrides")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_kind_from_extension() {
        assert_eq!(RootKind::of(Path::new("app.conf")), RootKind::Import);
        assert_eq!(RootKind::of(Path::new("app.ini")), RootKind::Import);
        assert_eq!(RootKind::of(Path::new("app.yml")), RootKind::ConditionalYaml);
        assert_eq!(RootKind::of(Path::new("app.json")), RootKind::Other);
        assert_eq!(RootKind::of(Path::new("conf.d")), RootKind::Other);
    }
}
