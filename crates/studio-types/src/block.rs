//! The content block: one typed unit of course content.
//!
//! A block is its location plus its explicitly-set fields. Containment is
//! by reference — the `children` field holds an ordered list of usage keys,
//! never embedded child blocks — so copying a block can never construct a
//! reference cycle in memory.

use serde::{Deserialize, Serialize};

use crate::fields::{FieldValue, Fields};
use crate::keys::{BlockId, Category, CourseKey, UsageKey};
use crate::schema::CHILDREN_FIELD;

/// Field name holding a block's human display name.
pub const DISPLAY_NAME_FIELD: &str = "display_name";

/// Field name on the course root holding its navigation tabs.
pub const TABS_FIELD: &str = "tabs";

/// A content block: location plus explicitly-set fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub location: UsageKey,
    pub fields: Fields,
}

impl Block {
    /// A block with no fields set.
    pub fn new(location: UsageKey) -> Self {
        Self {
            location,
            fields: Fields::new(),
        }
    }

    pub fn with_fields(location: UsageKey, fields: Fields) -> Self {
        Self { location, fields }
    }

    pub fn category(&self) -> &Category {
        &self.location.category
    }

    pub fn block_id(&self) -> &BlockId {
        &self.location.block_id
    }

    pub fn course_key(&self) -> &CourseKey {
        &self.location.course_key
    }

    /// Whether this is the course-root block.
    pub fn is_course_root(&self) -> bool {
        self.location.category.is_course()
    }

    // ── Field access ────────────────────────────────────────────────────

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Whether the field is explicitly set (vs defaulted).
    pub fn is_set(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    /// Clear an explicitly-set field, reverting it to its default.
    pub fn unset(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    /// The ordered child references, or empty if `children` is unset.
    pub fn children(&self) -> &[UsageKey] {
        match self.fields.get(CHILDREN_FIELD) {
            Some(FieldValue::ReferenceList(keys)) => keys,
            _ => &[],
        }
    }

    pub fn set_children(&mut self, children: Vec<UsageKey>) {
        self.fields
            .insert(CHILDREN_FIELD.to_string(), FieldValue::ReferenceList(children));
    }

    /// Whether `other` appears in this block's children, compared
    /// version-agnostically.
    pub fn has_child(&self, other: &UsageKey) -> bool {
        let target = other.version_agnostic();
        self.children()
            .iter()
            .any(|child| child.version_agnostic() == target)
    }

    pub fn display_name(&self) -> Option<&str> {
        self.fields.get(DISPLAY_NAME_FIELD).and_then(|v| v.as_str())
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.fields
            .insert(DISPLAY_NAME_FIELD.to_string(), FieldValue::string(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Branch;

    fn course_key() -> CourseKey {
        CourseKey::new("edX", "toy", "2012_Fall")
    }

    #[test]
    fn test_children_unset_is_empty() {
        let block = Block::new(course_key().make_usage_key("vertical", "v1"));
        assert!(block.children().is_empty());
        assert!(!block.is_set(CHILDREN_FIELD));
    }

    #[test]
    fn test_set_and_read_children() {
        let mut block = Block::new(course_key().make_usage_key("chapter", "ch1"));
        let kids = vec![
            course_key().make_usage_key("vertical", "v1"),
            course_key().make_usage_key("vertical", "v2"),
        ];
        block.set_children(kids.clone());
        assert_eq!(block.children(), &kids[..]);
    }

    #[test]
    fn test_has_child_is_version_agnostic() {
        let mut block = Block::new(
            course_key()
                .for_branch(Branch::Published)
                .make_usage_key("chapter", "ch1"),
        );
        block.set_children(vec![
            course_key()
                .for_branch(Branch::Published)
                .make_usage_key("vertical", "v1"),
        ]);
        let draft_child = course_key()
            .for_branch(Branch::Draft)
            .make_usage_key("vertical", "v1");
        assert!(block.has_child(&draft_child));
    }

    #[test]
    fn test_unset_reverts_field() {
        let mut block = Block::new(course_key().make_usage_key("html", "intro"));
        block.set_display_name("Intro");
        assert_eq!(block.display_name(), Some("Intro"));
        block.unset(DISPLAY_NAME_FIELD);
        assert_eq!(block.display_name(), None);
    }
}
