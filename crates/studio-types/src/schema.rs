//! Static field-kind schema and category capability sets.
//!
//! Which fields hold references is decided by a closed, per-category table
//! rather than runtime introspection: `children` is a reference list on
//! every container, and a handful of categories declare extra reference
//! fields. Everything not in the table is a scalar.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fields::FieldValue;
use crate::keys::{Category, UsageKey};

/// The closed set of field kinds.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar,
    Reference,
    ReferenceList,
    ReferenceMap,
}

/// The name of the ordered child-reference field on container blocks.
pub const CHILDREN_FIELD: &str = "children";

/// Categories that are never wired into a parent's children list
/// (reachable through course tabs or course metadata instead).
pub const DETACHED_CATEGORIES: &[&str] = &["static_tab", "about", "course_info"];

/// Categories whose legacy-store writes go straight to the published tree
/// rather than through a draft copy.
pub const DIRECT_ONLY_CATEGORIES: &[&str] =
    &["course", "chapter", "sequential", "about", "static_tab", "course_info"];

/// Whether blocks of this category live outside the child-containment tree.
pub fn is_detached(category: &Category) -> bool {
    DETACHED_CATEGORIES.contains(&category.as_str())
}

/// Whether legacy-store writes for this category bypass the draft tree.
pub fn is_direct_only(category: &Category) -> bool {
    DIRECT_ONLY_CATEGORIES.contains(&category.as_str())
}

/// Look up the kind of a field on a given category.
pub fn field_kind(category: &Category, field: &str) -> FieldKind {
    match (category.as_str(), field) {
        (_, CHILDREN_FIELD) => FieldKind::ReferenceList,
        ("conditional", "sources_list") => FieldKind::ReferenceList,
        ("split_test", "group_id_to_child") => FieldKind::ReferenceMap,
        ("discussion", "discussion_target") => FieldKind::Reference,
        _ => FieldKind::Scalar,
    }
}

/// Error typing an incoming JSON field value against the schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("field '{field}' on {category} expects {expected:?}, got: {got}")]
    BadShape {
        category: Category,
        field: String,
        expected: FieldKind,
        got: serde_json::Value,
    },
    #[error("field '{field}' holds an unparseable reference '{raw}'")]
    BadReference { field: String, raw: String },
}

/// Type a raw JSON value as the right [`FieldValue`] for `(category, name)`.
///
/// Reference-shaped fields must actually contain key strings; a shape
/// mismatch is a hard error, never a silent coercion to scalar.
pub fn parse_field(
    category: &Category,
    name: &str,
    value: serde_json::Value,
) -> Result<FieldValue, SchemaError> {
    let expected = field_kind(category, name);
    let bad_shape = |got: serde_json::Value| SchemaError::BadShape {
        category: category.clone(),
        field: name.to_string(),
        expected,
        got,
    };
    let parse_key = |raw: &str| {
        UsageKey::from_str(raw).map_err(|_| SchemaError::BadReference {
            field: name.to_string(),
            raw: raw.to_string(),
        })
    };

    match expected {
        FieldKind::Scalar => Ok(FieldValue::Scalar(value)),
        FieldKind::Reference => match value {
            serde_json::Value::Null => Ok(FieldValue::Reference(None)),
            serde_json::Value::String(s) => Ok(FieldValue::Reference(Some(parse_key(&s)?))),
            other => Err(bad_shape(other)),
        },
        FieldKind::ReferenceList => match value {
            serde_json::Value::Array(items) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::String(s) => keys.push(parse_key(&s)?),
                        other => return Err(bad_shape(other)),
                    }
                }
                Ok(FieldValue::ReferenceList(keys))
            }
            other => Err(bad_shape(other)),
        },
        FieldKind::ReferenceMap => match value {
            serde_json::Value::Object(entries) => {
                let mut map = BTreeMap::new();
                for (k, v) in entries {
                    match v {
                        serde_json::Value::String(s) => {
                            map.insert(k, parse_key(&s)?);
                        }
                        other => return Err(bad_shape(other)),
                    }
                }
                Ok(FieldValue::ReferenceMap(map))
            }
            other => Err(bad_shape(other)),
        },
    }
}
