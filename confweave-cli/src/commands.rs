//! Command handlers
//!
//! Each handler returns the text to print so it can be tested without
//! capturing stdout.

use anyhow::{bail, Result};
use confweave::writer::{to_ini, to_json, to_typed_json};
use confweave::{Configurable, DictionaryConfig, ReadMode, Sections};

use crate::cli::{Cli, Commands, OutputFormat};
use crate::load::load;

/// Run the parsed command line
pub fn run(cli: &Cli) -> Result<String> {
    match &cli.command {
        Commands::ClearCache => clear_cache(cli),
        Commands::Sections => Ok(sections(load(cli)?.as_ref())),
        Commands::Show {
            format,
            section,
            raw,
        } => {
            let mode = if *raw {
                ReadMode::Raw
            } else {
                ReadMode::Interpolated
            };
            show(load(cli)?.as_ref(), *format, section.as_deref(), mode)
        }
        Commands::Get {
            section,
            option,
            typed,
        } => get(load(cli)?.as_ref(), section, option, *typed),
    }
}

fn clear_cache(cli: &Cli) -> Result<String> {
    let Some(path) = &cli.cache else {
        bail!("no cache configured, pass --cache or set CONFWEAVE_CACHE");
    };
    let removed = confweave::ConfigCache::new(path).clear()?;
    Ok(if removed {
        format!("removed {}", path.display())
    } else {
        format!("no cache at {}", path.display())
    })
}

pub fn sections(config: &dyn Configurable) -> String {
    config.sections().join("\n")
}

pub fn show(
    config: &dyn Configurable,
    format: OutputFormat,
    section: Option<&str>,
    mode: ReadMode,
) -> Result<String> {
    let selected;
    let config: &dyn Configurable = match section {
        Some(name) => {
            if !config.has_section(name) {
                bail!("no section [{}] in {}", name, config.origin());
            }
            let mut one = Sections::new();
            one.insert(name.to_string(), config.options(name, mode)?);
            selected = DictionaryConfig::new(one);
            &selected
        }
        None => config,
    };
    let text = match format {
        OutputFormat::Ini => to_ini(config, mode)?,
        OutputFormat::Json => serde_json::to_string_pretty(&to_json(config, mode)?)?,
        OutputFormat::TypedJson => serde_json::to_string_pretty(&to_typed_json(config)?)?,
    };
    Ok(text.trim_end().to_string())
}

pub fn get(config: &dyn Configurable, section: &str, option: &str, typed: bool) -> Result<String> {
    if typed {
        Ok(config.get_option_object(option, Some(section))?.to_string())
    } else {
        Ok(config.get_option(option, Some(section))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use confweave::StringConfig;

    fn store() -> StringConfig {
        StringConfig::new("db.host=localhost, db.port=5432, app.name=demo").unwrap()
    }

    #[test]
    fn test_sections_in_order() {
        assert_eq!(sections(&store()), "db\napp");
    }

    #[test]
    fn test_show_single_section_as_ini() {
        let text = show(&store(), OutputFormat::Ini, Some("db"), ReadMode::Interpolated).unwrap();
        assert_eq!(text, "[db]\nhost = localhost\nport = 5432");
    }

    #[test]
    fn test_show_missing_section() {
        let err = show(&store(), OutputFormat::Json, Some("nope"), ReadMode::Raw).unwrap_err();
        assert!(err.to_string().contains("[nope]"));
    }

    #[test]
    fn test_show_typed_json() {
        let text = show(&store(), OutputFormat::TypedJson, None, ReadMode::Interpolated).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["db"]["port"], 5432);
        assert_eq!(json["app"]["name"], "demo");
    }

    #[test]
    fn test_get_plain_and_typed() {
        assert_eq!(get(&store(), "db", "port", false).unwrap(), "5432");
        assert_eq!(get(&store(), "db", "port", true).unwrap(), "5432");
        assert!(get(&store(), "db", "missing", false).is_err());
    }
}
