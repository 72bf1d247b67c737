use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::Values;

/// Canonical identity of an entity or a list within one resource
pub type Key = String;

/// Which attribute(s) identify an entity of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyBy {
    /// A single attribute whose value is the key
    Attribute(String),
    /// Composite identity, serialized as sorted `name=value` pairs
    Composite(Vec<String>),
}

impl Default for KeyBy {
    fn default() -> Self {
        KeyBy::Attribute("id".to_string())
    }
}

impl From<&str> for KeyBy {
    fn from(attribute: &str) -> Self {
        KeyBy::Attribute(attribute.to_string())
    }
}

/// Identity parameters passed to a command: either a literal key value or a
/// mapping of attribute names to values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Params {
    Map(Values),
    Scalar(Value),
}

impl Default for Params {
    fn default() -> Self {
        Params::Map(Values::new())
    }
}

impl Params {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Params::Map(map) => map.is_empty(),
            Params::Scalar(value) => value.is_null(),
        }
    }

    /// Expand into an attribute mapping. A scalar is bound to the identity
    /// attribute when the resource has a single-attribute identity.
    pub fn to_map(&self, key_by: &KeyBy) -> Values {
        match (self, key_by) {
            (Params::Map(map), _) => map.clone(),
            (Params::Scalar(Value::Null), _) => Values::new(),
            (Params::Scalar(value), KeyBy::Attribute(attribute)) => {
                let mut map = Values::new();
                map.insert(attribute.clone(), value.clone());
                map
            }
            (Params::Scalar(_), KeyBy::Composite(_)) => Values::new(),
        }
    }

    /// Copy of these params with the named attributes removed
    pub fn without(&self, attributes: &[String]) -> Params {
        match self {
            Params::Map(map) => Params::Map(
                map.iter()
                    .filter(|(name, _)| !attributes.contains(name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            ),
            Params::Scalar(value) => Params::Scalar(value.clone()),
        }
    }
}

impl From<Values> for Params {
    fn from(map: Values) -> Self {
        Params::Map(map)
    }
}

impl From<Value> for Params {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Params::Map(map),
            other => Params::Scalar(other),
        }
    }
}

impl From<&str> for Params {
    fn from(key: &str) -> Self {
        Params::Scalar(Value::String(key.to_string()))
    }
}

impl From<String> for Params {
    fn from(key: String) -> Self {
        Params::Scalar(Value::String(key))
    }
}

impl From<i64> for Params {
    fn from(key: i64) -> Self {
        Params::Scalar(Value::from(key))
    }
}

impl From<u64> for Params {
    fn from(key: u64) -> Self {
        Params::Scalar(Value::from(key))
    }
}

/// Coerce an attribute value to its key form. Strings are used verbatim,
/// numbers and booleans by their display form, null as the empty string.
pub fn key_of_value(value: &Value) -> Key {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Serialize a mapping as sorted `name=value` pairs joined with `.`
pub fn serialize_key(map: &Values) -> Key {
    let mut names: Vec<&String> = map.keys().collect();
    names.sort();

    names
        .into_iter()
        .map(|name| format!("{}={}", name, key_of_value(&map[name])))
        .collect::<Vec<_>>()
        .join(".")
}

/// Derive the key for a set of command parameters.
///
/// A single-attribute identity returns that attribute's value so that direct
/// lookups by the literal value work. Composite or absent identities use the
/// canonical serialization of every attribute. Scalars pass through.
pub fn derive_key(params: &Params, key_by: Option<&KeyBy>) -> Key {
    match params {
        Params::Scalar(value) => key_of_value(value),
        Params::Map(map) => match key_by {
            Some(KeyBy::Attribute(attribute)) => {
                map.get(attribute).map(key_of_value).unwrap_or_default()
            }
            Some(KeyBy::Composite(_)) | None => serialize_key(map),
        },
    }
}

/// Derive the key of a response payload. Only identity attributes take part,
/// so the rest of the payload never changes the key. Returns `None` when the
/// payload carries no identity.
pub fn key_from_values(values: &Values, key_by: &KeyBy) -> Option<Key> {
    match key_by {
        KeyBy::Attribute(attribute) => match values.get(attribute) {
            None | Some(Value::Null) => None,
            Some(value) => Some(key_of_value(value)),
        },
        KeyBy::Composite(attributes) => {
            let identity: Values = attributes
                .iter()
                .filter_map(|name| {
                    values
                        .get(name)
                        .filter(|value| !value.is_null())
                        .map(|value| (name.clone(), value.clone()))
                })
                .collect();

            if identity.is_empty() {
                None
            } else {
                Some(serialize_key(&identity))
            }
        }
    }
}

/// Generator for temporary keys of entities not yet confirmed by the remote.
/// Keys are millisecond timestamps, bumped so they never repeat.
#[derive(Debug, Default)]
pub struct TemporaryKeys {
    last: AtomicI64,
}

impl TemporaryKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Key {
        let now = Utc::now().timestamp_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or(now);

        now.max(previous + 1).to_string()
    }
}
