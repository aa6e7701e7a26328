//! Flat, dotted-path configuration options
//!
//! Jaeger components are configured through command-line flags such as
//! `--es.server-urls` or `--memory.max-traces`. Users write these flags in
//! the `Jaeger` resource as nested documents:
//!
//! ```yaml
//! options:
//!   memory:
//!     max-traces: 100000
//! ```
//!
//! `Options` flattens such a document into `memory.max-traces = "100000"`
//! and renders it back as `--memory.max-traces=100000`.
//!
//! ## Fidelity
//! A decoded `Options` keeps the original document until it is mutated,
//! so untouched resources are written back byte-for-byte. The first
//! change discards it and serialization falls back to the flat map.

pub mod freeform;

pub use freeform::FreeForm;

use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while decoding a hierarchical options document
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed options document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("options document must be a JSON object, got: {0}")]
    NotAnObject(String),
}

/// Flat set of component flags keyed by dotted path
#[derive(Clone, Debug, Default)]
pub struct Options {
    opts: BTreeMap<String, String>,
    /// Original document, kept until the first mutation
    raw: Option<Box<RawValue>>,
}

impl Options {
    /// Create an empty option set
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a hierarchical JSON document into a flat option set
    ///
    /// Nested objects become dotted keys (`{"a":{"b":{"c":1}}}` gives
    /// `a.b.c = "1"`). Numbers and booleans keep the literal text they were
    /// written with. `null` leaves are dropped. Any syntax error fails the
    /// whole decode.
    pub fn decode(document: &[u8]) -> Result<Self, DecodeError> {
        let raw: Box<RawValue> = serde_json::from_slice(document)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: Box<RawValue>) -> Result<Self, DecodeError> {
        let mut opts = BTreeMap::new();
        if !raw.get().starts_with('{') {
            return Err(DecodeError::NotAnObject(raw.get().to_string()));
        }
        flatten_raw_object(None, &raw, &mut opts)?;
        Ok(Options {
            opts,
            raw: Some(raw),
        })
    }

    /// Flatten an in-memory hierarchical value
    ///
    /// Non-object values produce an empty set.
    pub fn from_value(value: &Value) -> Self {
        let mut opts = BTreeMap::new();
        if let Value::Object(map) = value {
            for (key, value) in map {
                flatten_value(key.clone(), value, &mut opts);
            }
        }
        Options { opts, raw: None }
    }

    /// Build an option set directly from flat key/value pairs
    pub fn from_flat<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        entries.into_iter().collect()
    }

    /// Serialize the option set
    ///
    /// An untouched decoded set returns its original bytes. Otherwise the
    /// result is a one-level JSON object with dotted keys and string values.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self.pristine() {
            Some(raw) => Ok(raw.get().as_bytes().to_vec()),
            None => serde_json::to_vec(&self.opts),
        }
    }

    /// Keep only entries for `prefix` and its archive storage variant
    ///
    /// Matches keys starting with `prefix.` or `prefix-archive.`, so
    /// `filter("es")` selects both `es.server-urls` and
    /// `es-archive.server-urls`.
    pub fn filter(&self, prefix: &str) -> Options {
        let primary = format!("{prefix}.");
        let archive = format!("{prefix}-archive.");
        self.opts
            .iter()
            .filter(|(key, _)| key.starts_with(&primary) || key.starts_with(&archive))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Render one `--key=value` argument per entry
    pub fn to_args(&self) -> Vec<String> {
        self.opts
            .iter()
            .map(|(key, value)| format!("--{}={}", key, value))
            .collect()
    }

    /// Read-only view of the flat map
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.opts
    }

    /// Mutable view of the flat map
    ///
    /// Always leaves fidelity mode, since the caller may change anything.
    pub fn map_mut(&mut self) -> &mut BTreeMap<String, String> {
        self.raw = None;
        &mut self.opts
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.opts.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.opts.contains_key(key)
    }

    /// Set `key` to `value`, returning the previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let key = key.into();
        let value = value.into();
        if self.opts.get(&key) == Some(&value) {
            return Some(value);
        }
        self.raw = None;
        self.opts.insert(key, value)
    }

    /// Remove `key`, returning its value if it was present
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.opts.remove(key);
        if removed.is_some() {
            self.raw = None;
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.opts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.opts.len()
    }

    /// Nothing to write back: no entries and no retained document
    ///
    /// A decoded `{}` or `{"x":null}` is empty but not unset, so it is kept
    /// when the enclosing resource is written back.
    pub fn is_unset(&self) -> bool {
        self.opts.is_empty() && self.raw.is_none()
    }

    /// Whether serialization still returns the original document
    pub fn is_pristine(&self) -> bool {
        self.pristine().is_some()
    }

    fn pristine(&self) -> Option<&RawValue> {
        self.raw.as_deref().filter(|raw| !raw.get().is_empty())
    }
}

fn flatten_raw_object(
    prefix: Option<&str>,
    object: &RawValue,
    out: &mut BTreeMap<String, String>,
) -> Result<(), DecodeError> {
    let entries: BTreeMap<String, &RawValue> = serde_json::from_str(object.get())?;
    for (key, value) in entries {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };
        flatten_raw_value(key, value, out)?;
    }
    Ok(())
}

fn flatten_raw_value(
    key: String,
    value: &RawValue,
    out: &mut BTreeMap<String, String>,
) -> Result<(), DecodeError> {
    let text = value.get();
    match text.as_bytes().first() {
        Some(b'{') => flatten_raw_object(Some(&key), value, out)?,
        Some(b'"') => {
            let text: String = serde_json::from_str(text)?;
            out.insert(key, text);
        }
        Some(b'[') => {
            let items: Vec<&RawValue> = serde_json::from_str(text)?;
            let items: Vec<&str> = items.iter().map(|item| item.get()).collect();
            out.insert(key, format!("[{}]", items.join(",")));
        }
        Some(b'n') => {}
        // numbers and booleans keep their literal token
        _ => {
            out.insert(key, text.to_string());
        }
    }
    Ok(())
}

fn flatten_value(key: String, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (child, value) in map {
                flatten_value(format!("{key}.{child}"), value, out);
            }
        }
        Value::String(text) => {
            out.insert(key, text.clone());
        }
        Value::Null => {}
        other => {
            out.insert(key, other.to_string());
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Options {
            opts: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            raw: None,
        }
    }
}

/// Two option sets are equal when their flat maps are; retained bytes are
/// not compared.
impl PartialEq for Options {
    fn eq(&self, other: &Self) -> bool {
        self.opts == other.opts
    }
}

impl Eq for Options {}

impl Serialize for Options {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.pristine() {
            Some(raw) => raw.serialize(serializer),
            None => self.opts.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Options {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        if raw.get() == "null" {
            return Ok(Options::new());
        }
        Options::from_raw(raw).map_err(serde::de::Error::custom)
    }
}

impl JsonSchema for Options {
    fn schema_name() -> Cow<'static, str> {
        "Options".into()
    }

    fn inline_schema() -> bool {
        true
    }

    fn json_schema(_: &mut SchemaGenerator) -> Schema {
        json_schema!({
            "type": "object",
            "x-kubernetes-preserve-unknown-fields": true
        })
    }
}

#[cfg(test)]
#[path = "options_test.rs"]
mod tests;
