//! Block-level editing operations.
//!
//! These are the programmatic equivalents of Studio's save / create /
//! duplicate / delete actions, operating directly on the legacy store.
//! Static tabs need extra bookkeeping throughout: the course root holds a
//! mirror tab entry per `static_tab` block (membership and display name
//! kept in sync by these operations), a coupling the storage model itself
//! doesn't express.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;

use studio_store::{LegacyStore, RevisionOption, SourceStore};
use studio_types::{
    Block, BlockId, Category, CourseKey, CourseTab, FieldValue, Fields, TabList, UsageKey,
    CHILDREN_FIELD, DISPLAY_NAME_FIELD, is_detached, parse_field,
};

use crate::error::AuthoringError;
use crate::Result;

/// Categories where saving to a nonexistent key creates the block instead
/// of failing. Course info pages are not pre-created with the course.
const CREATE_IF_NOT_FOUND: &[&str] = &["course_info"];

/// A partial edit to one block.
///
/// `metadata` values of JSON null mean "delete the field" (revert to
/// default); to truly store a null, name the field in `nullout` instead.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateRequest {
    /// New content body (the `data` field).
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Full replacement child list, as key strings.
    #[serde(default)]
    pub children: Option<Vec<String>>,
    /// Partial metadata: field name → new value, or null to delete.
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, Option<serde_json::Value>>>,
    /// Fields to set to an actual null value.
    #[serde(default)]
    pub nullout: Option<Vec<String>>,
}

/// Apply a partial edit to a block.
///
/// For a `static_tab` block, the matching course tab's name follows the
/// block's display name — written back only when the two actually differ.
pub fn update_block(
    store: &mut LegacyStore,
    usage_key: &UsageKey,
    request: UpdateRequest,
) -> Result<Block> {
    let mut block = match store.get_item(usage_key) {
        Ok(block) => block,
        Err(studio_store::StoreError::ItemNotFound(_))
            if CREATE_IF_NOT_FOUND.contains(&usage_key.category.as_str()) =>
        {
            store.create_item(usage_key.clone(), Fields::new())?
        }
        Err(err) => return Err(err.into()),
    };
    let category = block.category().clone();

    if let Some(data) = request.data {
        block.set("data", typed(&category, "data", data)?);
    }

    if let Some(children) = request.children {
        let mut keys = Vec::with_capacity(children.len());
        for child in &children {
            let key = UsageKey::from_str(child)
                .map_err(|err| AuthoringError::InvalidData(err.to_string()))?;
            keys.push(key);
        }
        block.set_children(keys);
    }

    if let Some(nullout) = request.nullout {
        for name in nullout {
            let value = typed(&category, &name, serde_json::Value::Null)?;
            block.set(name, value);
        }
    }

    if let Some(metadata) = request.metadata {
        for (name, value) in metadata {
            match value {
                None => {
                    block.unset(&name);
                }
                Some(value) => {
                    let value = typed(&category, &name, value)?;
                    block.set(name, value);
                }
            }
        }
    }

    let block = store.update_item(&block)?;

    if category.as_str() == "static_tab" {
        sync_tab_name(store, &block)?;
    }
    Ok(block)
}

/// Create a block under `parent` with a freshly minted id.
///
/// Detached categories are not wired into the parent's children; a
/// `static_tab` additionally registers a course tab mirroring it.
pub fn create_block(
    store: &mut LegacyStore,
    parent_key: &UsageKey,
    category: impl Into<Category>,
    display_name: Option<&str>,
) -> Result<UsageKey> {
    let category = category.into();
    let mut parent = store.get_item(parent_key)?;
    let dest_key = parent_key
        .course_key
        .make_usage_key(category.clone(), BlockId::generate());

    let mut fields = Fields::new();
    if let Some(name) = display_name {
        fields.insert(DISPLAY_NAME_FIELD.to_string(), FieldValue::string(name));
    }
    store.create_item(dest_key.clone(), fields)?;

    if category.as_str() == "static_tab" {
        let mut course = store.get_course(&dest_key.course_key)?;
        let mut tabs = TabList::from_course(&course);
        tabs.push(CourseTab::static_tab(
            display_name.unwrap_or_default(),
            dest_key.block_id.to_string(),
        ));
        tabs.write_to(&mut course);
        store.update_item(&course)?;
    }

    if !is_detached(&category) {
        let mut children = parent.children().to_vec();
        children.push(dest_key.clone());
        parent.set_children(children);
        store.update_item(&parent)?;
    }
    Ok(dest_key)
}

/// Deep-copy `source` (children included, each with a fresh id) as a child
/// of `parent`.
///
/// When the source is itself a child of the parent, the copy lands right
/// after it; otherwise it is appended.
pub fn duplicate_block(
    store: &mut LegacyStore,
    parent_key: &UsageKey,
    source_key: &UsageKey,
    display_name: Option<&str>,
) -> Result<UsageKey> {
    let dest_key = duplicate_subtree(store, source_key, display_name)?;

    if !is_detached(&dest_key.category) {
        let mut parent = store.get_item(parent_key)?;
        let mut children = parent.children().to_vec();
        let source_index = children
            .iter()
            .position(|child| child.version_agnostic() == source_key.version_agnostic());
        match source_index {
            Some(index) => children.insert(index + 1, dest_key.clone()),
            None => children.push(dest_key.clone()),
        }
        parent.set_children(children);
        store.update_item(&parent)?;
    }
    Ok(dest_key)
}

/// Children are copied one by one rather than shared: the child list must
/// not alias the source's subtree.
fn duplicate_subtree(
    store: &mut LegacyStore,
    source_key: &UsageKey,
    display_name: Option<&str>,
) -> Result<UsageKey> {
    let source = store.get_item(source_key)?;
    let dest_key = source_key
        .course_key
        .make_usage_key(source_key.category.clone(), BlockId::generate());

    let mut fields = source.fields.clone();
    fields.remove(CHILDREN_FIELD);
    let name = match display_name {
        Some(name) => name.to_string(),
        None => match source.display_name() {
            Some(name) => format!("Duplicate of '{name}'"),
            None => format!("Duplicate of {}", source.category()),
        },
    };
    fields.insert(DISPLAY_NAME_FIELD.to_string(), FieldValue::string(name));
    store.create_item(dest_key.clone(), fields)?;

    if !source.children().is_empty() {
        let mut copies = Vec::with_capacity(source.children().len());
        for child in source.children() {
            copies.push(duplicate_subtree(store, child, None)?);
        }
        let mut dest = store.get_item(&dest_key)?;
        dest.set_children(copies);
        store.update_item(&dest)?;
    }
    Ok(dest_key)
}

/// Delete a block from every revision. A `static_tab` also loses its
/// course tab entry.
pub fn delete_block(store: &mut LegacyStore, usage_key: &UsageKey) -> Result<()> {
    if usage_key.category.as_str() == "static_tab" {
        let mut course = store.get_course(&usage_key.course_key)?;
        let mut tabs = TabList::from_course(&course);
        if tabs.remove_by_slug(usage_key.block_id.as_str()) {
            tabs.write_to(&mut course);
            store.update_item(&course)?;
        }
    }
    store.delete_item(usage_key, RevisionOption::All)?;
    Ok(())
}

/// Blocks unreachable from the course root (detached categories excluded).
pub fn get_orphans(store: &LegacyStore, course_key: &CourseKey) -> Vec<UsageKey> {
    store.get_orphans(course_key)
}

/// Delete every orphan in the course. Returns what was removed.
pub fn delete_orphans(store: &mut LegacyStore, course_key: &CourseKey) -> Result<Vec<UsageKey>> {
    let orphans = store.get_orphans(course_key);
    for orphan in &orphans {
        tracing::debug!(block = %orphan, "deleting orphan");
        store.delete_item(orphan, RevisionOption::All)?;
    }
    Ok(orphans)
}

fn typed(category: &Category, name: &str, value: serde_json::Value) -> Result<FieldValue> {
    parse_field(category, name, value).map_err(|err| AuthoringError::InvalidData(err.to_string()))
}

/// Course tabs record their static tab's display name; follow a rename,
/// but skip the course write when nothing changed.
fn sync_tab_name(store: &mut LegacyStore, tab_block: &Block) -> Result<()> {
    let Some(new_name) = tab_block.display_name() else {
        return Ok(());
    };
    let mut course = store.get_course(&tab_block.location.course_key)?;
    let mut tabs = TabList::from_course(&course);
    let Some(tab) = tabs.get_by_slug_mut(tab_block.block_id().as_str()) else {
        return Ok(());
    };
    if tab.name != new_name {
        tab.name = new_name.to_string();
        tabs.write_to(&mut course);
        store.update_item(&course)?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with_course() -> (LegacyStore, UsageKey) {
        let mut store = LegacyStore::new();
        let root = store
            .create_course("edX", "toy", "2012_Fall", Fields::new())
            .unwrap();
        (store, root.location)
    }

    fn course_key() -> CourseKey {
        CourseKey::new("edX", "toy", "2012_Fall")
    }

    #[test]
    fn test_create_block_appends_to_parent() {
        let (mut store, root) = store_with_course();
        let chapter = create_block(&mut store, &root, "chapter", Some("Week 1")).unwrap();

        let parent = store.get_item(&root).unwrap();
        assert_eq!(parent.children(), &[chapter.clone()]);
        let block = store.get_item(&chapter).unwrap();
        assert_eq!(block.display_name(), Some("Week 1"));
        assert_eq!(chapter.block_id.as_str().len(), 32);
    }

    #[test]
    fn test_create_detached_block_skips_parent_wiring() {
        let (mut store, root) = store_with_course();
        let about = create_block(&mut store, &root, "about", None).unwrap();
        assert!(store.get_item(&about).is_ok());
        assert!(store.get_item(&root).unwrap().children().is_empty());
    }

    #[test]
    fn test_create_static_tab_registers_course_tab() {
        let (mut store, root) = store_with_course();
        let tab = create_block(&mut store, &root, "static_tab", Some("Syllabus")).unwrap();

        let course = store.get_course(&course_key()).unwrap();
        let tabs = TabList::from_course(&course);
        let entry = tabs.get_by_slug(tab.block_id.as_str()).unwrap();
        assert_eq!(entry.name, "Syllabus");
        // Static tabs are detached: not in the root's children.
        assert!(store.get_item(&root).unwrap().children().is_empty());
    }

    #[test]
    fn test_update_metadata_and_data() {
        let (mut store, root) = store_with_course();
        let chapter = create_block(&mut store, &root, "chapter", None).unwrap();

        let request = UpdateRequest {
            data: Some(json!("<p>content</p>")),
            metadata: Some(BTreeMap::from([(
                "display_name".to_string(),
                Some(json!("Renamed")),
            )])),
            ..Default::default()
        };
        let updated = update_block(&mut store, &chapter, request).unwrap();
        assert_eq!(updated.display_name(), Some("Renamed"));
        assert_eq!(updated.get("data"), Some(&FieldValue::Scalar(json!("<p>content</p>"))));
    }

    #[test]
    fn test_metadata_null_deletes_but_nullout_stores_null() {
        let (mut store, root) = store_with_course();
        let chapter = create_block(&mut store, &root, "chapter", Some("Week 1")).unwrap();

        // null metadata value: field reverts to default (unset)
        let request = UpdateRequest {
            metadata: Some(BTreeMap::from([("display_name".to_string(), None)])),
            ..Default::default()
        };
        let updated = update_block(&mut store, &chapter, request).unwrap();
        assert!(!updated.is_set(DISPLAY_NAME_FIELD));

        // nullout: the field is explicitly set to null
        let request = UpdateRequest {
            nullout: Some(vec!["due".to_string()]),
            ..Default::default()
        };
        let updated = update_block(&mut store, &chapter, request).unwrap();
        assert_eq!(updated.get("due"), Some(&FieldValue::Scalar(json!(null))));
    }

    #[test]
    fn test_update_children_replaces_list() {
        let (mut store, root) = store_with_course();
        let chapter = create_block(&mut store, &root, "chapter", None).unwrap();
        let v1 = course_key().make_usage_key("vertical", "v1");
        let v2 = course_key().make_usage_key("vertical", "v2");

        let request = UpdateRequest {
            children: Some(vec![v2.to_string(), v1.to_string()]),
            ..Default::default()
        };
        let updated = update_block(&mut store, &chapter, request).unwrap();
        assert_eq!(updated.children(), &[v2, v1]);
    }

    #[test]
    fn test_update_rejects_bad_reference_payload() {
        let (mut store, root) = store_with_course();
        let chapter = create_block(&mut store, &root, "chapter", None).unwrap();
        let request = UpdateRequest {
            children: Some(vec!["not a key".to_string()]),
            ..Default::default()
        };
        let err = update_block(&mut store, &chapter, request);
        assert!(matches!(err, Err(AuthoringError::InvalidData(_))));
    }

    #[test]
    fn test_save_creates_course_info_on_miss() {
        let (mut store, _) = store_with_course();
        let handouts = course_key().make_usage_key("course_info", "handouts");
        let request = UpdateRequest {
            data: Some(json!("<ol></ol>")),
            ..Default::default()
        };
        let block = update_block(&mut store, &handouts, request).unwrap();
        assert_eq!(block.get("data"), Some(&FieldValue::Scalar(json!("<ol></ol>"))));
        assert!(store.get_item(&handouts).is_ok());
    }

    #[test]
    fn test_static_tab_rename_propagates_to_course_tab() {
        let (mut store, root) = store_with_course();
        let tab = create_block(&mut store, &root, "static_tab", Some("Old Name")).unwrap();

        let request = UpdateRequest {
            metadata: Some(BTreeMap::from([(
                "display_name".to_string(),
                Some(json!("New Name")),
            )])),
            ..Default::default()
        };
        update_block(&mut store, &tab, request).unwrap();

        let course = store.get_course(&course_key()).unwrap();
        let tabs = TabList::from_course(&course);
        assert_eq!(tabs.get_by_slug(tab.block_id.as_str()).unwrap().name, "New Name");
    }

    #[test]
    fn test_duplicate_inserts_after_source() {
        let (mut store, root) = store_with_course();
        let ch1 = create_block(&mut store, &root, "chapter", Some("One")).unwrap();
        let ch2 = create_block(&mut store, &root, "chapter", Some("Two")).unwrap();

        let copy = duplicate_block(&mut store, &root, &ch1, None).unwrap();
        let parent = store.get_item(&root).unwrap();
        assert_eq!(parent.children(), &[ch1, copy.clone(), ch2]);
        assert_eq!(
            store.get_item(&copy).unwrap().display_name(),
            Some("Duplicate of 'One'")
        );
    }

    #[test]
    fn test_duplicate_copies_subtree_with_fresh_ids() {
        let (mut store, root) = store_with_course();
        let chapter = create_block(&mut store, &root, "chapter", Some("Week 1")).unwrap();
        let vertical = create_block(&mut store, &chapter, "vertical", Some("Lesson")).unwrap();

        let copy = duplicate_block(&mut store, &root, &chapter, Some("Week 1 Copy")).unwrap();
        let copied = store.get_item(&copy).unwrap();
        assert_eq!(copied.display_name(), Some("Week 1 Copy"));
        assert_eq!(copied.children().len(), 1);

        let copied_child = &copied.children()[0];
        assert_ne!(copied_child.block_id, vertical.block_id);
        assert_eq!(
            store.get_item(copied_child).unwrap().display_name(),
            Some("Duplicate of 'Lesson'")
        );
        // Source subtree untouched
        assert_eq!(store.get_item(&chapter).unwrap().children(), &[vertical]);
    }

    #[test]
    fn test_delete_static_tab_removes_course_tab() {
        let (mut store, root) = store_with_course();
        let tab = create_block(&mut store, &root, "static_tab", Some("Syllabus")).unwrap();

        delete_block(&mut store, &tab).unwrap();
        assert!(store.get_item(&tab).is_err());
        let course = store.get_course(&course_key()).unwrap();
        assert!(TabList::from_course(&course).is_empty());
    }

    #[test]
    fn test_delete_orphans() {
        let (mut store, _) = store_with_course();
        let floating = course_key().make_usage_key("vertical", "floating");
        store.create_item(floating.clone(), Fields::new()).unwrap();

        assert_eq!(get_orphans(&store, &course_key()), vec![floating.clone()]);
        let removed = delete_orphans(&mut store, &course_key()).unwrap();
        assert_eq!(removed, vec![floating.clone()]);
        assert!(store.get_item(&floating).is_err());
        assert!(get_orphans(&store, &course_key()).is_empty());
    }
}
