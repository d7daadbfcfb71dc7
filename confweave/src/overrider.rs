//! Overrides applied over a finished store
//!
//! An override is either the path of a configuration file or directory, or a
//! [`StringConfig`] literal such as `db.host=prod,debug=False`. Its values
//! replace the target's.

use crate::configurable::Configurable;
use crate::factory::{ConfigurableFactory, LoaderParams};
use crate::import::ImportContext;
use crate::string::StringConfig;
use crate::ConfigResult;
use std::path::Path;
use tracing::info;

/// Load the store an override names
pub fn load_override(source: &str, factory: &ConfigurableFactory) -> ConfigResult<Box<dyn Configurable>> {
    let path = Path::new(source);
    if path.exists() {
        info!("overriding with file: {}", path.display());
        let mut params = LoaderParams::new("override", Default::default());
        let mut config = factory.from_path(path, &mut params)?;
        params.finish(&config.origin())?;
        config.resolve_imports(&ImportContext::default())?;
        Ok(config)
    } else {
        info!("overriding with: {}", source);
        Ok(Box::new(StringConfig::new(source)?))
    }
}

/// Merge every override over `target`, in order
pub fn apply_overrides<S: AsRef<str>>(
    target: &mut dyn Configurable,
    overrides: &[S],
    factory: &ConfigurableFactory,
) -> ConfigResult<()> {
    for source in overrides {
        let config = load_override(source.as_ref(), factory)?;
        target.merge(config.as_ref())?;
    }
    Ok(())
}
