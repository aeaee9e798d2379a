//! Field values for content blocks.
//!
//! A block's persisted state is a map of explicitly-set fields. Values are
//! a closed set of kinds: plain scalars (any JSON), or one of three
//! reference shapes that hold cross-block keys and must be rewritten when
//! content moves between stores. Absence from the map means the field is
//! unset (defaulted) — there is no separate null-vs-unset distinction at
//! this layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::keys::UsageKey;
use crate::schema::FieldKind;

/// The explicitly-set fields of a block, by field name.
pub type Fields = BTreeMap<String, FieldValue>;

/// One field value.
///
/// Reference-shaped values carry [`UsageKey`]s that the migration layer
/// rewrites; scalars pass through storage untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    /// Any non-reference value, as JSON.
    Scalar(serde_json::Value),
    /// A single cross-block reference. `None` models a reference field
    /// explicitly set to null — translation is undefined for it.
    Reference(Option<UsageKey>),
    /// An ordered list of references (e.g. `children`).
    ReferenceList(Vec<UsageKey>),
    /// Arbitrary keys mapping to references (e.g. split-test groups).
    ReferenceMap(BTreeMap<String, UsageKey>),
}

impl FieldValue {
    /// Shorthand for a string scalar.
    pub fn string(s: impl Into<String>) -> Self {
        Self::Scalar(serde_json::Value::String(s.into()))
    }

    /// Which of the closed field kinds this value is.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Scalar(_) => FieldKind::Scalar,
            Self::Reference(_) => FieldKind::Reference,
            Self::ReferenceList(_) => FieldKind::ReferenceList,
            Self::ReferenceMap(_) => FieldKind::ReferenceMap,
        }
    }

    /// JSON-serializable representation: references become their string
    /// key form. Used by the create path, which hands fields to the store
    /// as plain JSON.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::Reference(None) => serde_json::Value::Null,
            Self::Reference(Some(key)) => serde_json::Value::String(key.to_string()),
            Self::ReferenceList(keys) => serde_json::Value::Array(
                keys.iter()
                    .map(|k| serde_json::Value::String(k.to_string()))
                    .collect(),
            ),
            Self::ReferenceMap(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.to_string())))
                    .collect(),
            ),
        }
    }

    /// The scalar string inside, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(serde_json::Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}
