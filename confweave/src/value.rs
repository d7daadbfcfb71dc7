//! Typed option values produced by the [`Serializer`](crate::Serializer)
//!
//! Stores only ever hold strings; a [`Value`] exists between parsing an option
//! and handing it to the application.

use crate::{ConfigError, ConfigResult};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::PathBuf;

/// Key used to tag non-JSON-native collections in `json:` values
pub(crate) const JSON_TYPE_KEY: &str = "_type";
/// Key holding the payload of a tagged `json:` value
pub(crate) const JSON_DATA_KEY: &str = "_data";

/// A parsed option value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// The literal `None`
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    List(Vec<Value>),
    /// Insertion-ordered, duplicate-free sequence
    Set(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(IndexMap<String, Value>),
    /// Opaque reference to a registered class name
    Class(String),
}

impl Value {
    /// Build a set, dropping repeated elements while keeping first-seen order
    pub fn set_from(items: impl IntoIterator<Item = Value>) -> Self {
        let mut out: Vec<Value> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Value::Set(out)
    }

    /// Truthiness as used by conditional nodes and `enabled` lookups
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Path(_) | Value::Class(_) => true,
            Value::List(v) | Value::Set(v) | Value::Tuple(v) => !v.is_empty(),
            Value::Dict(d) => !d.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Elements of any sequence-like value
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) | Value::Set(v) | Value::Tuple(v) => Some(v),
            _ => None,
        }
    }

    /// Render a scalar the way it appears inside a list or file name
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Path(p) => p.display().to_string(),
            Value::Class(c) => c.clone(),
            other => other.to_string(),
        }
    }

    /// Convert to a JSON value with `_type`/`_data` tags for sets, tuples and paths
    pub(crate) fn to_tagged_json(&self) -> ConfigResult<serde_json::Value> {
        use serde_json::Value as J;
        Ok(match self {
            Value::None => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => J::Number(
                serde_json::Number::from_f64(*f)
                    .ok_or_else(|| ConfigError::serialization(f.to_string(), "non-finite float"))?,
            ),
            Value::Str(s) => J::String(s.clone()),
            Value::Class(c) => J::String(c.clone()),
            Value::Path(p) => tagged("path", J::String(p.display().to_string())),
            Value::List(items) => J::Array(tagged_items(items)?),
            Value::Set(items) => tagged("set", J::Array(tagged_items(items)?)),
            Value::Tuple(items) => tagged("tuple", J::Array(tagged_items(items)?)),
            Value::Dict(map) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_tagged_json()?);
                }
                J::Object(obj)
            }
        })
    }

    /// Inverse of [`Value::to_tagged_json`]
    pub(crate) fn from_tagged_json(json: serde_json::Value) -> Value {
        use serde_json::Value as J;
        match json {
            J::Null => Value::None,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            J::String(s) => Value::Str(s),
            J::Array(items) => Value::List(items.into_iter().map(Value::from_tagged_json).collect()),
            J::Object(mut obj) => {
                let tag = match (obj.get(JSON_TYPE_KEY), obj.len()) {
                    (Some(J::String(t)), 2) if obj.contains_key(JSON_DATA_KEY) => Some(t.clone()),
                    _ => None,
                };
                if let Some(tag) = tag {
                    match (tag.as_str(), obj.remove(JSON_DATA_KEY)) {
                        ("path", Some(J::String(p))) => return Value::Path(PathBuf::from(p)),
                        ("set", Some(J::Array(items))) => {
                            return Value::set_from(items.into_iter().map(Value::from_tagged_json))
                        }
                        ("tuple", Some(J::Array(items))) => {
                            return Value::Tuple(
                                items.into_iter().map(Value::from_tagged_json).collect(),
                            )
                        }
                        (_, Some(data)) => {
                            obj.insert(JSON_DATA_KEY.to_string(), data);
                        }
                        (_, None) => {}
                    }
                }
                Value::Dict(
                    obj.into_iter()
                        .map(|(k, v)| (k, Value::from_tagged_json(v)))
                        .collect(),
                )
            }
        }
    }

    /// Convert a YAML node, stringifying non-string mapping keys
    pub fn from_yaml(yaml: &serde_yaml_ng::Value) -> Value {
        use serde_yaml_ng::Value as Y;
        match yaml {
            Y::Null => Value::None,
            Y::Bool(b) => Value::Bool(*b),
            Y::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Y::String(s) => Value::Str(s.clone()),
            Y::Sequence(items) => Value::List(items.iter().map(Value::from_yaml).collect()),
            Y::Mapping(map) => Value::Dict(
                map.iter()
                    .map(|(k, v)| (yaml_scalar_string(k), Value::from_yaml(v)))
                    .collect(),
            ),
            Y::Tagged(tagged) => Value::from_yaml(&tagged.value),
        }
    }

    /// Convert to plain JSON for deserializing into application types
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::None => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(J::Number)
                .unwrap_or(J::Null),
            Value::Str(s) | Value::Class(s) => J::String(s.clone()),
            Value::Path(p) => J::String(p.display().to_string()),
            Value::List(v) | Value::Set(v) | Value::Tuple(v) => {
                J::Array(v.iter().map(Value::to_json).collect())
            }
            Value::Dict(d) => J::Object(d.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

/// Render a YAML scalar the way it is stored as an option value
pub(crate) fn yaml_scalar_string(yaml: &serde_yaml_ng::Value) -> String {
    use serde_yaml_ng::Value as Y;
    match yaml {
        Y::String(s) => s.clone(),
        Y::Null => "None".to_string(),
        Y::Bool(true) => "True".to_string(),
        Y::Bool(false) => "False".to_string(),
        Y::Number(n) => n.to_string(),
        other => Value::from_yaml(other).to_string(),
    }
}

fn tagged(tag: &str, data: serde_json::Value) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert(JSON_TYPE_KEY.to_string(), serde_json::Value::String(tag.to_string()));
    obj.insert(JSON_DATA_KEY.to_string(), data);
    serde_json::Value::Object(obj)
}

fn tagged_items(items: &[Value]) -> ConfigResult<Vec<serde_json::Value>> {
    items.iter().map(Value::to_tagged_json).collect()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Str(s) => write!(f, "{}", s),
            Value::Path(p) => write!(f, "{}", p.display()),
            Value::Class(c) => write!(f, "{}", c),
            Value::List(items) | Value::Set(items) | Value::Tuple(items) => {
                let parts: Vec<String> = items.iter().map(Value::to_plain_string).collect();
                write!(f, "{}", parts.join(", "))
            }
            Value::Dict(map) => {
                let parts: Vec<String> = map.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Value::Path(p)
    }
}

/// The parsed options of one section, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: IndexMap<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.values
    }

    /// Deserialize the settings into an application type
    ///
    /// ```
    /// use confweave::{Serializer, Settings};
    /// use indexmap::IndexMap;
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Db {
    ///     host: String,
    ///     port: u16,
    /// }
    ///
    /// let mut options = IndexMap::new();
    /// options.insert("host".to_string(), "localhost".to_string());
    /// options.insert("port".to_string(), "5432".to_string());
    ///
    /// let mut settings = Settings::new();
    /// Serializer::new().populate_state(&options, &mut settings).unwrap();
    /// let db: Db = settings.deserialize().unwrap();
    /// assert_eq!(db.port, 5432);
    /// ```
    pub fn deserialize<T: DeserializeOwned>(&self) -> ConfigResult<T> {
        let obj: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(obj)).map_err(|source| ConfigError::Json {
            origin: "settings".to_string(),
            source,
        })
    }
}

impl IntoIterator for Settings {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
