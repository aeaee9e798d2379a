//! Course navigation tabs.
//!
//! The course root owns a list of tabs stored in its `tabs` scalar field.
//! Static tabs mirror a `static_tab` content block 1:1 via `url_slug ==
//! block_id`; the authoring layer keeps name and membership in sync when
//! those blocks change.

use serde::{Deserialize, Serialize};

use crate::block::{Block, TABS_FIELD};
use crate::fields::FieldValue;

/// Tab type tag for block-backed static tabs.
pub const STATIC_TAB_TYPE: &str = "static_tab";

/// One navigation entry on a course.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseTab {
    #[serde(rename = "type")]
    pub tab_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_slug: Option<String>,
}

impl CourseTab {
    /// A static tab mirroring the block with id `slug`.
    pub fn static_tab(name: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            tab_type: STATIC_TAB_TYPE.to_string(),
            name: name.into(),
            url_slug: Some(slug.into()),
        }
    }
}

/// The course's tab list, read out of and written back into the course
/// root's `tabs` field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TabList(Vec<CourseTab>);

impl TabList {
    /// Read the tab list off a course root. A missing or malformed `tabs`
    /// field reads as empty.
    pub fn from_course(course: &Block) -> Self {
        let tabs = match course.get(TABS_FIELD) {
            Some(FieldValue::Scalar(value)) => {
                serde_json::from_value(value.clone()).unwrap_or_default()
            }
            _ => Vec::new(),
        };
        Self(tabs)
    }

    /// Write the tab list back onto the course root.
    pub fn write_to(&self, course: &mut Block) {
        // serializing Vec<CourseTab> cannot fail
        let value = serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Array(vec![]));
        course.set(TABS_FIELD, FieldValue::Scalar(value));
    }

    pub fn get_by_slug(&self, slug: &str) -> Option<&CourseTab> {
        self.0.iter().find(|t| t.url_slug.as_deref() == Some(slug))
    }

    pub fn get_by_slug_mut(&mut self, slug: &str) -> Option<&mut CourseTab> {
        self.0.iter_mut().find(|t| t.url_slug.as_deref() == Some(slug))
    }

    /// Drop the tab mirroring `slug`. Returns whether anything was removed.
    pub fn remove_by_slug(&mut self, slug: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t.url_slug.as_deref() != Some(slug));
        self.0.len() != before
    }

    pub fn push(&mut self, tab: CourseTab) {
        self.0.push(tab);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CourseTab> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::CourseKey;

    fn course_root() -> Block {
        let key = CourseKey::new("edX", "toy", "2012_Fall");
        Block::new(key.make_usage_key("course", "2012_Fall"))
    }

    #[test]
    fn test_missing_tabs_field_reads_empty() {
        let course = course_root();
        assert!(TabList::from_course(&course).is_empty());
    }

    #[test]
    fn test_roundtrip_through_course_field() {
        let mut course = course_root();
        let mut tabs = TabList::default();
        tabs.push(CourseTab {
            tab_type: "courseware".to_string(),
            name: "Courseware".to_string(),
            url_slug: None,
        });
        tabs.push(CourseTab::static_tab("Syllabus", "syllabus"));
        tabs.write_to(&mut course);

        let read = TabList::from_course(&course);
        assert_eq!(read, tabs);
        assert_eq!(read.get_by_slug("syllabus").unwrap().name, "Syllabus");
    }

    #[test]
    fn test_remove_by_slug() {
        let mut tabs = TabList::default();
        tabs.push(CourseTab::static_tab("Syllabus", "syllabus"));
        tabs.push(CourseTab::static_tab("FAQ", "faq"));
        assert!(tabs.remove_by_slug("syllabus"));
        assert!(!tabs.remove_by_slug("syllabus"));
        assert_eq!(tabs.len(), 1);
    }

    #[test]
    fn test_rename_via_slug_lookup() {
        let mut tabs = TabList::default();
        tabs.push(CourseTab::static_tab("Old Name", "info"));
        tabs.get_by_slug_mut("info").unwrap().name = "New Name".to_string();
        assert_eq!(tabs.get_by_slug("info").unwrap().name, "New Name");
    }
}
