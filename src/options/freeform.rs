//! Structure-preserving configuration blocks
//!
//! Some sections of a `Jaeger` resource (UI configuration, sampling
//! strategies) are handed to the component as a whole JSON file rather than
//! as flags. They must keep their nesting, so they are stored as the raw
//! document and never flattened.

use super::DecodeError;
use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};
use std::borrow::Cow;

const EMPTY_OBJECT: &str = "{}";

/// Opaque nested document, passed through untouched
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FreeForm {
    json: String,
}

impl FreeForm {
    pub fn new(value: &Value) -> Self {
        FreeForm {
            json: value.to_string(),
        }
    }

    /// Wrap an existing document after checking that it is valid JSON
    pub fn decode(document: &[u8]) -> Result<Self, DecodeError> {
        let raw: &RawValue = serde_json::from_slice(document)?;
        Ok(FreeForm {
            json: raw.get().to_string(),
        })
    }

    /// Empty means no document at all, or exactly `{}`
    pub fn is_empty(&self) -> bool {
        self.json.is_empty() || self.json == EMPTY_OBJECT
    }

    /// Parse the document as a JSON object
    pub fn to_map(&self) -> Result<Map<String, Value>, DecodeError> {
        if self.json.is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&self.json)? {
            Value::Object(map) => Ok(map),
            other => Err(DecodeError::NotAnObject(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        if self.json.is_empty() {
            EMPTY_OBJECT
        } else {
            &self.json
        }
    }
}

impl Serialize for FreeForm {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = RawValue::from_string(self.as_str().to_string())
            .map_err(serde::ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FreeForm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let json = match raw.get() {
            "null" => String::new(),
            other => other.to_string(),
        };
        Ok(FreeForm { json })
    }
}

impl JsonSchema for FreeForm {
    fn schema_name() -> Cow<'static, str> {
        "FreeForm".into()
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
