//! String to typed value codec
//!
//! Option values are always stored as strings. The [`Serializer`] turns them
//! into [`Value`]s on demand and formats values back into strings that parse
//! to the same value.
//!
//! Recognized forms, checked in order:
//!
//! | Form | Result |
//! |------|--------|
//! | `None` | [`Value::None`] |
//! | `1.5`, `.5`, `1e3`, `-7` | float / int |
//! | `True`, `False` | bool |
//! | `str: <s>` | string, forcing literal treatment of numeric-looking text |
//! | `path: <p>` | path with `~` expanded |
//! | `list(<opts>): a, b` / `set(..)` / `tuple(..)` | sequence, optional element type |
//! | `resource(<module>): <rel>` | path under a registered resource root |
//! | `eval(<opts>): <expr>` / `dict(..)` | closed function table or literal |
//! | `class: <name>` | opaque class reference |
//! | `json: <blob>` | decoded JSON with set/tuple/path tags |
//!
//! Anything else, including `instance:`, `object:`, `dataclass(..):`,
//! `alias:` and `call:` markers, is returned unchanged as a string.

use crate::value::Value;
use crate::{ConfigError, ConfigResult, Settings};
use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, trace};

/// A function callable from `eval:` values
pub type EvalFunction = fn(&[Value]) -> Result<Value, String>;

static FLOAT_REGEX: OnceLock<Regex> = OnceLock::new();
static SCI_REGEX: OnceLock<Regex> = OnceLock::new();
static INT_REGEX: OnceLock<Regex> = OnceLock::new();
static BOOL_REGEX: OnceLock<Regex> = OnceLock::new();
static STRING_REGEX: OnceLock<Regex> = OnceLock::new();
static PATH_REGEX: OnceLock<Regex> = OnceLock::new();
static LIST_REGEX: OnceLock<Regex> = OnceLock::new();
static RESOURCE_REGEX: OnceLock<Regex> = OnceLock::new();
static EVAL_REGEX: OnceLock<Regex> = OnceLock::new();
static CLASS_REGEX: OnceLock<Regex> = OnceLock::new();
static JSON_REGEX: OnceLock<Regex> = OnceLock::new();
static LIST_SPLIT_REGEX: OnceLock<Regex> = OnceLock::new();
static CALL_REGEX: OnceLock<Regex> = OnceLock::new();
static IDENT_REGEX: OnceLock<Regex> = OnceLock::new();

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("Invalid serializer regex"))
}

/// Allowed keys in an `eval(...)` directive
const EVAL_KEYS: [&str; 2] = ["resolve", "import"];

/// Parses and formats option values
#[derive(Debug, Clone)]
pub struct Serializer {
    default_resource_module: Option<String>,
    resource_roots: IndexMap<String, PathBuf>,
    functions: IndexMap<String, EvalFunction>,
    classes: IndexSet<String>,
}

impl Default for Serializer {
    fn default() -> Self {
        let mut functions: IndexMap<String, EvalFunction> = IndexMap::new();
        functions.insert("env".to_string(), builtin_env);
        functions.insert("home".to_string(), builtin_home);
        functions.insert("cwd".to_string(), builtin_cwd);
        functions.insert("join".to_string(), builtin_join);
        functions.insert("upper".to_string(), builtin_upper);
        functions.insert("lower".to_string(), builtin_lower);
        functions.insert("concat".to_string(), builtin_concat);
        Self {
            default_resource_module: None,
            resource_roots: IndexMap::new(),
            functions,
            classes: IndexSet::new(),
        }
    }
}

impl Serializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the directory that `resource(<module>): ...` resolves against
    pub fn with_resource_root(mut self, module: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.resource_roots.insert(module.into(), root.into());
        self
    }

    /// Module used by `resource: ...` when no module is given
    pub fn with_default_resource_module(mut self, module: impl Into<String>) -> Self {
        self.default_resource_module = Some(module.into());
        self
    }

    /// Add a function callable from `eval:` values
    pub fn with_function(mut self, name: impl Into<String>, function: EvalFunction) -> Self {
        self.functions.insert(name.into(), function);
        self
    }

    /// Restrict `class:` values to registered names
    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.classes.insert(class_name.into());
        self
    }

    /// Parse a raw option value into a typed value
    pub fn parse_object(&self, raw: &str) -> ConfigResult<Value> {
        if raw == "None" {
            return Ok(Value::None);
        }
        if regex(&FLOAT_REGEX, r"^[-+]?\d*\.\d+$").is_match(raw)
            || regex(&SCI_REGEX, r"^[+-]?(?:0|[1-9]\d*)(?:\.\d*)?[eE][+\-]?\d+$").is_match(raw)
        {
            return raw
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| ConfigError::serialization(raw, e.to_string()));
        }
        if regex(&INT_REGEX, r"^[-+]?[0-9]+$").is_match(raw) {
            // digits past i64 (ids, checksums) stay text rather than losing precision
            return Ok(match raw.parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Str(raw.to_string()),
            });
        }
        if regex(&BOOL_REGEX, r"^(?:True|False)$").is_match(raw) {
            return Ok(Value::Bool(raw == "True"));
        }
        if let Some(caps) = regex(&STRING_REGEX, r"(?s)^str:\s*(.+)$").captures(raw) {
            return Ok(Value::Str(caps[1].to_string()));
        }
        if let Some(caps) = regex(&PATH_REGEX, r"(?s)^path:\s*(.+)$").captures(raw) {
            return Ok(Value::Path(expand_user(&caps[1])));
        }
        if let Some(caps) =
            regex(&LIST_REGEX, r"(?s)^(list|set|tuple)(?:\((.+)\))?:\s*(.+)$").captures(raw)
        {
            let directive = caps.get(2).map(|m| m.as_str());
            return self.parse_sequence(raw, &caps[1], directive, &caps[3]);
        }
        if let Some(caps) =
            regex(&RESOURCE_REGEX, r"(?s)^resource(?:\((.+)\))?:\s*(.+)$").captures(raw)
        {
            let module = caps.get(1).map(|m| m.as_str());
            return self.resource_filename(raw, &caps[2], module);
        }
        if let Some(caps) =
            regex(&EVAL_REGEX, r"(?s)^(?:eval|dict)(?:\((.+)\))?:\s*(.+)$").captures(raw)
        {
            let directive = caps.get(1).map(|m| m.as_str());
            return self.parse_eval(raw, directive, &caps[2]);
        }
        if let Some(caps) = regex(&CLASS_REGEX, r"^class:\s*(.+)$").captures(raw) {
            let class_name = caps[1].trim().to_string();
            if !self.classes.is_empty() && !self.classes.contains(&class_name) {
                return Err(ConfigError::UnknownClass { class_name });
            }
            return Ok(Value::Class(class_name));
        }
        if let Some(caps) = regex(&JSON_REGEX, r"(?s)^json:\s*(.+)$").captures(raw) {
            let json: serde_json::Value = serde_json::from_str(&caps[1])
                .map_err(|e| ConfigError::serialization(raw, e.to_string()))?;
            return Ok(Value::from_tagged_json(json));
        }
        Ok(Value::Str(raw.to_string()))
    }

    /// Format a value so that [`Serializer::parse_object`] gives it back
    pub fn format_option(&self, value: &Value) -> ConfigResult<String> {
        Ok(match value {
            Value::Str(s) => s.clone(),
            Value::Float(f) if !f.is_finite() => {
                return Err(ConfigError::serialization(f.to_string(), "non-finite float"))
            }
            Value::None | Value::Bool(_) | Value::Int(_) | Value::Float(_) => value.to_string(),
            Value::Class(name) => format!("class: {}", name),
            Value::Path(p) => format!("path: {}", p.display()),
            other => {
                let json = other.to_tagged_json()?;
                let text = serde_json::to_string(&json)
                    .map_err(|e| ConfigError::serialization(other.to_string(), e.to_string()))?;
                format!("json: {}", text)
            }
        })
    }

    /// Parse every option and store the result in `target`
    pub fn populate_state(
        &self,
        options: &IndexMap<String, String>,
        target: &mut Settings,
    ) -> ConfigResult<()> {
        for (name, raw) in options {
            let value = self.parse_object(raw)?;
            trace!("setting {} => {:?}", name, value);
            target.insert(name.clone(), value);
        }
        Ok(())
    }

    /// Split a comma separated list, trimming whitespace around the commas
    pub fn parse_list(&self, text: &str) -> Vec<String> {
        regex(&LIST_SPLIT_REGEX, r"\s*,\s*")
            .split(text)
            .map(str::to_string)
            .collect()
    }

    /// Parse an option expected to name one or more items
    ///
    /// Sequences yield their elements, `None` yields nothing and any other
    /// scalar is a single item.
    pub fn parse_names(&self, raw: &str) -> ConfigResult<Vec<String>> {
        match self.parse_object(raw)? {
            Value::None => Ok(Vec::new()),
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                Ok(items.iter().map(Value::to_plain_string).collect())
            }
            Value::Dict(_) => Err(ConfigError::serialization(raw, "expected a list of names")),
            other => Ok(vec![other.to_plain_string()]),
        }
    }

    /// Resolve a resource path against registered module roots
    pub fn resource_filename(
        &self,
        raw: &str,
        resource: &str,
        module: Option<&str>,
    ) -> ConfigResult<Value> {
        let module = module.or(self.default_resource_module.as_deref());
        let Some(module) = module else {
            debug!("no module path: {}", resource);
            return Ok(Value::Path(PathBuf::from(resource)));
        };
        match self.resource_roots.get(module) {
            Some(root) => {
                let path = root.join(resource);
                debug!("found resource path: {}", path.display());
                Ok(Value::Path(path))
            }
            None => Err(ConfigError::serialization(
                raw,
                format!("missing resource module '{}'", module),
            )),
        }
    }

    fn parse_sequence(
        &self,
        raw: &str,
        kind: &str,
        directive: Option<&str>,
        items: &str,
    ) -> ConfigResult<Value> {
        let mut parsed: Vec<Value> = self.parse_list(items).into_iter().map(Value::Str).collect();
        if let Some(directive) = directive {
            let element_type = self.list_element_type(raw, directive)?;
            if let Some(element_type) = element_type {
                parsed = parsed
                    .into_iter()
                    .map(|item| self.coerce(raw, &element_type, item))
                    .collect::<ConfigResult<Vec<_>>>()?;
            }
        }
        match kind {
            "list" => Ok(Value::List(parsed)),
            "set" => Ok(Value::set_from(parsed)),
            "tuple" => Ok(Value::Tuple(parsed)),
            other => Err(ConfigError::serialization(
                raw,
                format!("unknown sequence type: {}", other),
            )),
        }
    }

    fn list_element_type(&self, raw: &str, directive: &str) -> ConfigResult<Option<String>> {
        let opts = match self.parse_literal(raw, directive)? {
            Value::Dict(opts) => opts,
            _ => {
                return Err(ConfigError::serialization(
                    raw,
                    "sequence directive must be a mapping",
                ))
            }
        };
        let mut element_type = None;
        for (key, value) in opts {
            match key.as_str() {
                "type" => element_type = Some(value.to_plain_string()),
                other => {
                    return Err(ConfigError::serialization(
                        raw,
                        format!("unknown sequence directive key: {}", other),
                    ))
                }
            }
        }
        Ok(element_type)
    }

    fn coerce(&self, raw: &str, element_type: &str, item: Value) -> ConfigResult<Value> {
        let text = item.to_plain_string();
        let bad = |reason: String| ConfigError::serialization(raw, reason);
        match element_type {
            "str" => Ok(item),
            "object" => self.parse_object(&text),
            "int" => text
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| bad(format!("'{}' is not an int: {}", text, e))),
            "float" => text
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| bad(format!("'{}' is not a float: {}", text, e))),
            "bool" => match text.as_str() {
                "True" | "true" => Ok(Value::Bool(true)),
                "False" | "false" => Ok(Value::Bool(false)),
                _ => Err(bad(format!("'{}' is not a bool", text))),
            },
            "path" => Ok(Value::Path(expand_user(&text))),
            other => Err(bad(format!("unknown sequence element type: {}", other))),
        }
    }

    fn parse_eval(&self, raw: &str, directive: Option<&str>, expr: &str) -> ConfigResult<Value> {
        let mut bindings: IndexMap<String, Value> = IndexMap::new();
        if let Some(directive) = directive {
            let opts = match self.parse_literal(raw, directive)? {
                Value::Dict(opts) => opts,
                _ => {
                    return Err(ConfigError::serialization(
                        raw,
                        "evaluation directive must be a mapping",
                    ))
                }
            };
            let bad_keys: Vec<&str> = opts
                .keys()
                .map(String::as_str)
                .filter(|k| !EVAL_KEYS.contains(k))
                .collect();
            if !bad_keys.is_empty() {
                return Err(ConfigError::serialization(
                    raw,
                    format!("Unknown evaluation keys: {}", bad_keys.join(", ")),
                ));
            }
            if let Some(imports) = opts.get("import") {
                let names: Vec<String> = match imports {
                    Value::List(v) | Value::Set(v) | Value::Tuple(v) => {
                        v.iter().map(Value::to_plain_string).collect()
                    }
                    other => vec![other.to_plain_string()],
                };
                for name in names {
                    debug!("importing: {}", name);
                    if !self.functions.contains_key(&name) {
                        return Err(ConfigError::serialization(
                            raw,
                            format!("unknown evaluation import: {}", name),
                        ));
                    }
                }
            }
            if let Some(resolve) = opts.get("resolve") {
                let Value::Dict(resolve) = resolve else {
                    return Err(ConfigError::serialization(raw, "'resolve' must be a mapping"));
                };
                for (name, value) in resolve {
                    let value = match value {
                        Value::Str(s) => self.parse_object(s)?,
                        other => other.clone(),
                    };
                    bindings.insert(name.clone(), value);
                }
            }
        }
        self.eval_expr(raw, expr.trim(), &bindings)
    }

    fn eval_expr(
        &self,
        raw: &str,
        expr: &str,
        bindings: &IndexMap<String, Value>,
    ) -> ConfigResult<Value> {
        if let Some(caps) =
            regex(&CALL_REGEX, r"(?s)^([A-Za-z_][A-Za-z0-9_]*)\((.*)\)$").captures(expr)
        {
            if let Some(function) = self.functions.get(&caps[1]) {
                let args = split_top_level(&caps[2])
                    .into_iter()
                    .filter(|a| !a.trim().is_empty())
                    .map(|a| self.eval_expr(raw, a.trim(), bindings))
                    .collect::<ConfigResult<Vec<_>>>()?;
                trace!("calling {} with {:?}", &caps[1], args);
                return function(&args).map_err(|reason| ConfigError::serialization(raw, reason));
            }
        }
        if regex(&IDENT_REGEX, r"^[A-Za-z_][A-Za-z0-9_]*$").is_match(expr) {
            if let Some(value) = bindings.get(expr) {
                return Ok(value.clone());
            }
        }
        if expr.starts_with('(') && expr.ends_with(')') {
            let inner = &expr[1..expr.len() - 1];
            let items = split_top_level(inner)
                .into_iter()
                .filter(|a| !a.trim().is_empty())
                .map(|a| self.eval_expr(raw, a.trim(), bindings))
                .collect::<ConfigResult<Vec<_>>>()?;
            return Ok(Value::Tuple(items));
        }
        self.parse_literal(raw, expr)
    }

    /// Parse a literal written in YAML flow syntax
    fn parse_literal(&self, raw: &str, text: &str) -> ConfigResult<Value> {
        let yaml: serde_yaml_ng::Value = serde_yaml_ng::from_str(text)
            .map_err(|e| ConfigError::serialization(raw, e.to_string()))?;
        Ok(Value::from_yaml(&yaml))
    }
}

/// Expand a leading `~` to the home directory
pub(crate) fn expand_user(path: &str) -> PathBuf {
    let path = path.trim();
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Split on commas that are not nested in brackets or quotes
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

fn builtin_env(args: &[Value]) -> Result<Value, String> {
    let name = args
        .first()
        .map(Value::to_plain_string)
        .ok_or("env() needs a variable name")?;
    match std::env::var(&name) {
        Ok(value) => Ok(Value::Str(value)),
        Err(_) => args
            .get(1)
            .cloned()
            .ok_or_else(|| format!("environment variable '{}' is not set", name)),
    }
}

fn builtin_home(_args: &[Value]) -> Result<Value, String> {
    dirs::home_dir()
        .map(Value::Path)
        .ok_or_else(|| "Unable to determine home directory".to_string())
}

fn builtin_cwd(_args: &[Value]) -> Result<Value, String> {
    std::env::current_dir()
        .map(Value::Path)
        .map_err(|e| format!("Unable to determine current directory: {}", e))
}

fn builtin_join(args: &[Value]) -> Result<Value, String> {
    let mut parts = args.iter().map(Value::to_plain_string);
    let first = parts.next().ok_or("join() needs at least one path")?;
    Ok(Value::Path(
        parts.fold(PathBuf::from(first), |acc, p| acc.join(Path::new(&p))),
    ))
}

fn builtin_upper(args: &[Value]) -> Result<Value, String> {
    let s = args.first().ok_or("upper() needs an argument")?;
    Ok(Value::Str(s.to_plain_string().to_uppercase()))
}

fn builtin_lower(args: &[Value]) -> Result<Value, String> {
    let s = args.first().ok_or("lower() needs an argument")?;
    Ok(Value::Str(s.to_plain_string().to_lowercase()))
}

fn builtin_concat(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Str(args.iter().map(Value::to_plain_string).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn ser() -> Serializer {
        Serializer::new()
    }

    #[test]
    fn test_primitives() {
        let s = ser();
        assert_eq!(s.parse_object("None").unwrap(), Value::None);
        assert_eq!(s.parse_object("1.5").unwrap(), Value::Float(1.5));
        assert_eq!(s.parse_object(".5").unwrap(), Value::Float(0.5));
        assert_eq!(s.parse_object("1e3").unwrap(), Value::Float(1000.0));
        assert_eq!(s.parse_object("-2.5E-1").unwrap(), Value::Float(-0.25));
        assert_eq!(s.parse_object("-42").unwrap(), Value::Int(-42));
        assert_eq!(s.parse_object("True").unwrap(), Value::Bool(true));
        assert_eq!(s.parse_object("False").unwrap(), Value::Bool(false));
        assert_eq!(s.parse_object("true").unwrap(), Value::Str("true".into()));
        assert_eq!(s.parse_object("hello").unwrap(), Value::Str("hello".into()));
    }

    #[test]
    fn test_oversized_integer_stays_text() {
        let s = ser();
        let id = "12345678901234567890";
        assert_eq!(s.parse_object(id).unwrap(), Value::Str(id.into()));
        assert_eq!(s.parse_object("-99999999999999999999").unwrap(), Value::Str("-99999999999999999999".into()));
        assert_eq!(s.parse_object("9223372036854775807").unwrap(), Value::Int(i64::MAX));
        let formatted = s.format_option(&Value::Str(id.into())).unwrap();
        assert_eq!(s.parse_object(&formatted).unwrap(), Value::Str(id.into()));
    }

    #[test]
    fn test_str_prefix_forces_literal() {
        assert_eq!(ser().parse_object("str: 123").unwrap(), Value::Str("123".into()));
    }

    #[test]
    fn test_path_prefix() {
        assert_eq!(
            ser().parse_object("path: /etc/app.conf").unwrap(),
            Value::Path(PathBuf::from("/etc/app.conf"))
        );
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                ser().parse_object("path: ~/x").unwrap(),
                Value::Path(home.join("x"))
            );
        }
    }

    #[test]
    fn test_sequences() {
        let s = ser();
        assert_eq!(
            s.parse_object("list: a, b ,c").unwrap(),
            Value::List(vec!["a".into(), "b".into(), "c".into()])
        );
        assert_eq!(
            s.parse_object("set: a, b, a").unwrap(),
            Value::Set(vec!["a".into(), "b".into()])
        );
        assert_eq!(
            s.parse_object("tuple: x").unwrap(),
            Value::Tuple(vec!["x".into()])
        );
        assert_eq!(
            s.parse_object("list({'type': 'int'}): 1, 2").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            s.parse_object("list({'type': 'object'}): 1.5, True, x").unwrap(),
            Value::List(vec![Value::Float(1.5), Value::Bool(true), "x".into()])
        );
    }

    #[test]
    fn test_bad_sequence_directive_raises_with_raw() {
        let raw = "list({'kind': 'int'}): 1, 2";
        let err = ser().parse_object(raw).unwrap_err();
        assert!(err.to_string().contains(raw));

        let err = ser().parse_object("list({'type': 'int'}): 1, x").unwrap_err();
        assert!(matches!(err, ConfigError::Serialization { .. }));
    }

    #[test]
    fn test_resource() {
        let s = Serializer::new()
            .with_resource_root("app", "/opt/app/resources")
            .with_default_resource_module("app");
        assert_eq!(
            s.parse_object("resource(app): obj.conf").unwrap(),
            Value::Path(PathBuf::from("/opt/app/resources/obj.conf"))
        );
        assert_eq!(
            s.parse_object("resource: obj.conf").unwrap(),
            Value::Path(PathBuf::from("/opt/app/resources/obj.conf"))
        );
        assert!(s.parse_object("resource(other): x").is_err());
        assert_eq!(
            ser().parse_object("resource: rel/x.yml").unwrap(),
            Value::Path(PathBuf::from("rel/x.yml"))
        );
    }

    #[test]
    fn test_eval_literals_and_functions() {
        let s = ser();
        assert_eq!(
            s.parse_object("eval: [1, 2]").unwrap(),
            Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(
            s.parse_object("eval: (1, 'a')").unwrap(),
            Value::Tuple(vec![Value::Int(1), "a".into()])
        );
        assert_eq!(
            s.parse_object("eval: upper(concat('ab', 'c'))").unwrap(),
            Value::Str("ABC".into())
        );
        match s.parse_object("dict: {'a': 1, 'b': [x]}").unwrap() {
            Value::Dict(d) => {
                assert_eq!(d["a"], Value::Int(1));
                assert_eq!(d["b"], Value::List(vec!["x".into()]));
            }
            other => panic!("expected dict, got {:?}", other),
        }
    }

    #[test]
    fn test_eval_resolve_and_import() {
        let s = ser();
        assert_eq!(
            s.parse_object("eval({'resolve': {'root': 'path: /srv'}}): join(root, 'data')")
                .unwrap(),
            Value::Path(PathBuf::from("/srv/data"))
        );
        assert!(s
            .parse_object("eval({'import': ['upper']}): upper('x')")
            .is_ok());
        let err = s.parse_object("eval({'import': ['os']}): 1").unwrap_err();
        assert!(err.to_string().contains("os"));
    }

    #[test]
    fn test_eval_unknown_keys() {
        let raw = "eval({'bogus': 1}): 3";
        let err = ser().parse_object(raw).unwrap_err();
        assert!(err.to_string().contains("Unknown evaluation keys: bogus"));
        assert!(err.to_string().contains(raw));
    }

    #[test]
    #[serial]
    fn test_eval_env() {
        std::env::set_var("CONFWEAVE_SERIAL_TEST", "on");
        assert_eq!(
            ser().parse_object("eval: env('CONFWEAVE_SERIAL_TEST')").unwrap(),
            Value::Str("on".into())
        );
        std::env::remove_var("CONFWEAVE_SERIAL_TEST");
        assert_eq!(
            ser()
                .parse_object("eval: env('CONFWEAVE_SERIAL_TEST', 'off')")
                .unwrap(),
            Value::Str("off".into())
        );
    }

    #[test]
    fn test_class_registry() {
        assert_eq!(
            ser().parse_object("class: app.Model").unwrap(),
            Value::Class("app.Model".into())
        );
        let s = Serializer::new().with_class("app.Model");
        assert!(s.parse_object("class: app.Model").is_ok());
        assert!(matches!(
            s.parse_object("class: app.Other"),
            Err(ConfigError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_json() {
        let value = ser()
            .parse_object(r#"json: {"a": [1, 2], "b": {"_type": "set", "_data": ["x"]}}"#)
            .unwrap();
        let Value::Dict(d) = value else {
            panic!("expected dict")
        };
        assert_eq!(d["a"], Value::List(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(d["b"], Value::Set(vec!["x".into()]));
        assert!(ser().parse_object("json: {bad").is_err());
    }

    #[test]
    fn test_markers_pass_through() {
        for raw in [
            "instance: db",
            "object: app.Thing",
            "dataclass(app.Cfg): cfg",
            "alias: db:host",
            "call: worker",
        ] {
            assert_eq!(ser().parse_object(raw).unwrap(), Value::Str(raw.into()));
        }
    }

    #[test]
    fn test_format_round_trip() {
        let s = ser();
        let mut dict = IndexMap::new();
        dict.insert("k".to_string(), Value::Int(1));
        dict.insert("p".to_string(), Value::Path("/a".into()));
        let values = vec![
            Value::Int(7),
            Value::Float(2.5),
            Value::Float(1e20),
            Value::Bool(true),
            Value::Path(PathBuf::from("/var/data")),
            Value::List(vec!["a".into(), "b c".into()]),
            Value::Set(vec!["x".into(), "y".into()]),
            Value::Tuple(vec!["1".into(), "2".into()]),
            Value::Dict(dict),
            Value::Class("app.Model".into()),
            Value::None,
        ];
        for value in values {
            let formatted = s.format_option(&value).unwrap();
            assert_eq!(s.parse_object(&formatted).unwrap(), value, "{}", formatted);
        }
    }

    #[test]
    fn test_format_non_finite_float_fails() {
        assert!(ser().format_option(&Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_populate_state() {
        let mut options = IndexMap::new();
        options.insert("port".to_string(), "5432".to_string());
        options.insert("debug".to_string(), "True".to_string());
        let mut settings = Settings::new();
        ser().populate_state(&options, &mut settings).unwrap();
        assert_eq!(settings.get("port"), Some(&Value::Int(5432)));
        assert_eq!(settings.get("debug"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_parse_names() {
        let s = ser();
        assert_eq!(s.parse_names("list: a, b").unwrap(), vec!["a", "b"]);
        assert_eq!(s.parse_names("single").unwrap(), vec!["single"]);
        assert!(s.parse_names("None").unwrap().is_empty());
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("a, f(b, c), '1,2', [3, 4]"),
            vec!["a", " f(b, c)", " '1,2'", " [3, 4]"]
        );
    }
}
