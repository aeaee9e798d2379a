//! Reference translation between store namespaces.
//!
//! Block ids carry over verbatim from the legacy store — except the course
//! root's, which the split store mints itself. So translating a reference
//! is re-rooting the key into the destination course, with one special
//! case: a reference to a block of category "course" must resolve to the
//! destination root's block id, whatever the source root was called.

use std::collections::BTreeMap;

use studio_store::JsonFields;
use studio_types::{Block, BlockId, Category, CourseKey, FieldValue, Fields, UsageKey};

/// Translate one cross-block reference into the destination course's
/// namespace.
///
/// `course_block_id` is the destination root's block id. It is `None` only
/// while the destination root itself is being created — at that point a
/// course self-reference keeps its source block id, since there is no
/// destination root to substitute yet.
pub fn translate_reference(
    source: &UsageKey,
    dest_course: &CourseKey,
    course_block_id: Option<&BlockId>,
) -> UsageKey {
    if source.category.is_course()
        && let Some(root_id) = course_block_id
    {
        return dest_course.make_usage_key(Category::COURSE, root_id.clone());
    }
    source.map_into_course(dest_course.clone())
}

/// The explicitly-set fields of `block` with every reference translated,
/// as typed values. Used when patching an existing destination block.
///
/// A reference field explicitly set to null passes through untranslated —
/// translation is undefined for it.
pub fn fields_translated(
    block: &Block,
    dest_course: &CourseKey,
    course_block_id: Option<&BlockId>,
) -> Fields {
    block
        .fields
        .iter()
        .map(|(name, value)| {
            let translated = match value {
                FieldValue::Scalar(_) | FieldValue::Reference(None) => value.clone(),
                FieldValue::Reference(Some(key)) => FieldValue::Reference(Some(
                    translate_reference(key, dest_course, course_block_id),
                )),
                FieldValue::ReferenceList(keys) => FieldValue::ReferenceList(
                    keys.iter()
                        .map(|key| translate_reference(key, dest_course, course_block_id))
                        .collect(),
                ),
                FieldValue::ReferenceMap(map) => FieldValue::ReferenceMap(
                    map.iter()
                        .map(|(k, key)| {
                            (k.clone(), translate_reference(key, dest_course, course_block_id))
                        })
                        .collect::<BTreeMap<_, _>>(),
                ),
            };
            (name.clone(), translated)
        })
        .collect()
}

/// Same as [`fields_translated`], rendered as a JSON payload. Used by the
/// create paths, which hand fields to the store untyped.
pub fn json_fields_translated(
    block: &Block,
    dest_course: &CourseKey,
    course_block_id: Option<&BlockId>,
) -> JsonFields {
    fields_translated(block, dest_course, course_block_id)
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
