//! Rendering of stores as INI text or JSON

use crate::configurable::{Configurable, ReadMode, Sections};
use crate::ConfigResult;

/// Every section of `config` read in `mode`
pub fn snapshot(config: &dyn Configurable, mode: ReadMode) -> ConfigResult<Sections> {
    config
        .sections()
        .into_iter()
        .map(|name| {
            let options = config.options(&name, mode)?;
            Ok((name, options))
        })
        .collect()
}

/// Render `config` as INI text that parses back to the same sections
///
/// Multi-line values are written as indented continuation lines.
pub fn to_ini(config: &dyn Configurable, mode: ReadMode) -> ConfigResult<String> {
    let mut out = String::new();
    for (i, (section, options)) in snapshot(config, mode)?.into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("[{}]\n", section));
        for (option, value) in options {
            let value = value.replace('\n', "\n\t");
            if value.is_empty() {
                out.push_str(&format!("{} =\n", option));
            } else {
                out.push_str(&format!("{} = {}\n", option, value));
            }
        }
    }
    Ok(out)
}

/// Render `config` as a JSON object of sections holding string values
pub fn to_json(config: &dyn Configurable, mode: ReadMode) -> ConfigResult<serde_json::Value> {
    let sections = snapshot(config, mode)?;
    Ok(serde_json::Value::Object(
        sections
            .into_iter()
            .map(|(name, options)| {
                let options = options
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                (name, serde_json::Value::Object(options))
            })
            .collect(),
    ))
}

/// Render `config` as JSON with every value parsed by its serializer
pub fn to_typed_json(config: &dyn Configurable) -> ConfigResult<serde_json::Value> {
    let mut root = serde_json::Map::new();
    for name in config.sections() {
        let mut section = serde_json::Map::new();
        for option in config.options(&name, ReadMode::Interpolated)?.keys() {
            let value = config.get_option_object(option, Some(&name))?;
            section.insert(option.clone(), value.to_json());
        }
        root.insert(name, serde_json::Value::Object(section));
    }
    Ok(serde_json::Value::Object(root))
}
