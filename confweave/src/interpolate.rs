//! Extended `${section:option}` interpolation
//!
//! Supported references:
//! - `${option}` resolves in the section holding the value
//! - `${section:option}` resolves in the named section
//! - `$$` is a literal `$`
//!
//! Referenced values are interpolated recursively, up to
//! [`MAX_INTERPOLATION_DEPTH`] levels.

use crate::configurable::Sections;
use crate::{ConfigError, ConfigResult};
use tracing::trace;

/// Deepest chain of nested references that is followed
pub const MAX_INTERPOLATION_DEPTH: usize = 10;

/// Source of raw values for reference resolution
pub trait Lookup {
    fn lookup(&self, section: &str, option: &str) -> Option<&str>;
}

/// Resolves references against section tables in order, first hit wins
#[derive(Debug, Default)]
pub struct LayeredLookup<'a> {
    layers: Vec<&'a Sections>,
}

impl<'a> LayeredLookup<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(mut self, sections: &'a Sections) -> Self {
        self.layers.push(sections);
        self
    }
}

impl Lookup for LayeredLookup<'_> {
    fn lookup(&self, section: &str, option: &str) -> Option<&str> {
        self.layers.iter().find_map(|layer| {
            let options = layer.get(section)?;
            options
                .get(option)
                .or_else(|| options.get(&option.to_lowercase()))
                .map(String::as_str)
        })
    }
}

/// Interpolate `value`, which is the raw value of `section:option`
pub fn interpolate(
    lookup: &dyn Lookup,
    section: &str,
    option: &str,
    value: &str,
) -> ConfigResult<String> {
    expand(lookup, section, option, value, 1)
}

/// Escape `$` so the text survives another interpolation pass unchanged
pub fn escape(value: &str) -> String {
    value.replace('$', "$$")
}

/// Escape each `$` that does not begin `$$` or `${`
///
/// Valid template text comes back unchanged. Text from a store without
/// interpolation may hold a literal `$` next to references meant for the
/// store it is copied into; the literal is kept and the references stay live.
pub fn escape_stray(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c != '$' {
            continue;
        }
        match chars.peek() {
            Some('$') => {
                out.push('$');
                chars.next();
            }
            Some('{') => {}
            _ => out.push('$'),
        }
    }
    out
}

/// Prepare a value read from one store for an interpolating target
///
/// `resolved` text has had its references expanded already and is escaped
/// whole; anything else is treated as template text.
pub fn for_target(value: &str, resolved: bool) -> String {
    if resolved {
        escape(value)
    } else {
        escape_stray(value)
    }
}

fn expand(
    lookup: &dyn Lookup,
    section: &str,
    option: &str,
    value: &str,
    depth: usize,
) -> ConfigResult<String> {
    if depth > MAX_INTERPOLATION_DEPTH {
        return Err(ConfigError::InterpolationDepth {
            section: section.to_string(),
            option: option.to_string(),
        });
    }
    if !value.contains('$') {
        return Ok(value.to_string());
    }
    let fail = |reason: String| ConfigError::Interpolation {
        section: section.to_string(),
        option: option.to_string(),
        value: value.to_string(),
        reason,
    };

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + 1..];
        if let Some(after) = rest.strip_prefix('$') {
            out.push('$');
            rest = after;
        } else if let Some(after) = rest.strip_prefix('{') {
            let end = after
                .find('}')
                .ok_or_else(|| fail("bad interpolation variable reference".to_string()))?;
            let name = &after[..end];
            rest = &after[end + 1..];
            let parts: Vec<&str> = name.split(':').collect();
            let (ref_section, ref_option) = match parts.as_slice() {
                [opt] => (section, *opt),
                [sec, opt] => (*sec, *opt),
                _ => return Err(fail(format!("more than one ':' found in '{}'", name))),
            };
            let ref_option = ref_option.to_lowercase();
            trace!("resolving {}:{} for {}:{}", ref_section, ref_option, section, option);
            let raw = lookup.lookup(ref_section, &ref_option).ok_or_else(|| {
                fail(format!(
                    "no option '{}' in section '{}'",
                    ref_option, ref_section
                ))
            })?;
            let resolved = expand(lookup, ref_section, &ref_option, raw, depth + 1)?;
            out.push_str(&resolved);
        } else {
            return Err(fail("'$' must be followed by '$' or '{'".to_string()));
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn table(entries: &[(&str, &str, &str)]) -> Sections {
        let mut sections = Sections::new();
        for (sec, opt, val) in entries {
            sections
                .entry(sec.to_string())
                .or_insert_with(IndexMap::new)
                .insert(opt.to_string(), val.to_string());
        }
        sections
    }

    #[test]
    fn test_same_and_cross_section() {
        let t = table(&[
            ("paths", "root", "/srv"),
            ("paths", "data", "${root}/data"),
            ("db", "file", "${paths:data}/db.sqlite"),
        ]);
        let lookup = LayeredLookup::new().layer(&t);
        assert_eq!(
            interpolate(&lookup, "db", "file", "${paths:data}/db.sqlite").unwrap(),
            "/srv/data/db.sqlite"
        );
    }

    #[test]
    fn test_dollar_escape() {
        let t = Sections::new();
        let lookup = LayeredLookup::new().layer(&t);
        assert_eq!(interpolate(&lookup, "a", "b", "cost $$5").unwrap(), "cost $5");
        assert_eq!(escape("a$b"), "a$$b");
    }

    #[test]
    fn test_escape_stray_keeps_templates() {
        assert_eq!(escape_stray("pg://${db:host}:$$5"), "pg://${db:host}:$$5");
        assert_eq!(escape_stray("$5 and ${a:b}"), "$$5 and ${a:b}");
        assert_eq!(escape_stray("ends with $"), "ends with $$");

        let t = table(&[("a", "b", "x")]);
        let lookup = LayeredLookup::new().layer(&t);
        let text = for_target("$5 per ${a:b}", false);
        assert_eq!(interpolate(&lookup, "s", "o", &text).unwrap(), "$5 per x");
        let text = for_target("$5 per ${a:b}", true);
        assert_eq!(interpolate(&lookup, "s", "o", &text).unwrap(), "$5 per ${a:b}");
    }

    #[test]
    fn test_missing_reference() {
        let t = Sections::new();
        let lookup = LayeredLookup::new().layer(&t);
        let err = interpolate(&lookup, "s2", "y", "${s1:x}").unwrap_err();
        match err {
            ConfigError::Interpolation { section, option, .. } => {
                assert_eq!(section, "s2");
                assert_eq!(option, "y");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bare_dollar_fails() {
        let t = Sections::new();
        let lookup = LayeredLookup::new().layer(&t);
        assert!(interpolate(&lookup, "a", "b", "$x").is_err());
    }

    #[test]
    fn test_cycle_hits_depth_limit() {
        let t = table(&[("a", "x", "${y}"), ("a", "y", "${x}")]);
        let lookup = LayeredLookup::new().layer(&t);
        assert!(matches!(
            interpolate(&lookup, "a", "x", "${y}"),
            Err(ConfigError::InterpolationDepth { .. })
        ));
    }

    #[test]
    fn test_layers_first_hit_wins() {
        let first = table(&[("s", "k", "first")]);
        let second = table(&[("s", "k", "second"), ("s", "only", "fallback")]);
        let lookup = LayeredLookup::new().layer(&first).layer(&second);
        assert_eq!(interpolate(&lookup, "s", "v", "${k}").unwrap(), "first");
        assert_eq!(interpolate(&lookup, "s", "v", "${only}").unwrap(), "fallback");
    }
}
