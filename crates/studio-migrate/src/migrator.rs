//! Course migration from the legacy dual-tree store into the split store.
//!
//! The legacy model keeps draft and published as two parallel unversioned
//! trees sharing block ids; the split model keeps one versioned tree per
//! branch. A single copy pass cannot bridge that gap, so migration runs as
//! two phases communicating through a pending-adoption table:
//!
//! 1. Copy the published tree, point the draft branch at the resulting
//!    version, and strip child references that never existed in published
//!    (legacy parents list the union of both trees' children).
//! 2. Walk the draft tree. Blocks that also existed in published get
//!    patched in place; private blocks get created and queued for
//!    adoption, because their parent may not have been visited yet —
//!    source iteration order is unspecified. The adoption pass then wires
//!    each private block into its parent at the right sibling position.
//!
//! The source store is read-only throughout.

use indexmap::IndexMap;

use studio_store::{Result, RevisionOption, SourceStore, SplitStore, StoreError};
use studio_types::{BlockId, Branch, Category, CourseKey, UsageKey};

use crate::translate::{fields_translated, json_fields_translated, translate_reference};

/// Migrates one course at a time from `source` into `split`.
pub struct SplitMigrator<'a, S: SourceStore> {
    split: &'a mut SplitStore,
    source: &'a S,
}

impl<'a, S: SourceStore> SplitMigrator<'a, S> {
    pub fn new(split: &'a mut SplitStore, source: &'a S) -> Self {
        Self { split, source }
    }

    /// Copy a whole course into the split store.
    ///
    /// The destination course id defaults to the source's own org/course/
    /// run; any of the three can be overridden. Fails with
    /// [`StoreError::DuplicateCourse`] if the destination already exists —
    /// there is no merge support. On any store failure the error
    /// propagates and the migration of this course aborts; the source is
    /// never mutated either way.
    ///
    /// Returns the destination course key (no branch qualifier).
    pub fn migrate_course(
        &mut self,
        source_course: &CourseKey,
        new_org: Option<&str>,
        new_course: Option<&str>,
        new_run: Option<&str>,
    ) -> Result<CourseKey> {
        let dest_course = source_course
            .without_branch()
            .replace_ids(new_org, new_course, new_run);
        tracing::info!(source = %source_course, dest = %dest_course, "migrating course");

        // Seed the destination course from the source root's fields. No
        // root substitution yet: the destination root is what this call
        // creates.
        let source_root = self.source.get_course(source_course)?;
        let root_fields = json_fields_translated(&source_root, &dest_course, None);
        let new_root = self.split.create_course(
            dest_course.org.clone(),
            dest_course.course.clone(),
            dest_course.run.clone(),
            root_fields,
            Branch::Published,
        )?;
        let dest_root_id = new_root.block_id().clone();

        let source = self.source;
        self.split.bulk_write_operations(&dest_course, |split| {
            copy_published_modules(split, source, source_course, &dest_course, &dest_root_id)
        })?;
        self.split.bulk_write_operations(&dest_course, |split| {
            add_draft_modules(split, source, source_course, &dest_course, &dest_root_id)
        })?;

        tracing::info!(dest = %dest_course, "course migration complete");
        Ok(dest_course)
    }
}

/// Phase 1: copy every published block, then seed the draft branch.
///
/// Creation order doesn't matter — children fields are translated
/// independently of creation sequence, and the wildcard iteration visits
/// every stored block (detached pages and published orphans included).
fn copy_published_modules<S: SourceStore>(
    split: &mut SplitStore,
    source: &S,
    source_course: &CourseKey,
    dest_course: &CourseKey,
    dest_root_id: &BlockId,
) -> Result<()> {
    let dest_published = dest_course.for_branch(Branch::Published);

    for block in source.get_items(source_course, RevisionOption::PublishedOnly) {
        if block.is_course_root() {
            continue;
        }
        let fields = json_fields_translated(&block, dest_course, Some(dest_root_id));
        split.create_item(
            &dest_published,
            block.category().clone(),
            block.block_id().clone(),
            fields,
        )?;
    }

    // Draft starts identical to published: clone the version pointer
    // before draft deltas land on top.
    let mut info = split.get_course_index_info(dest_course)?;
    let published_version = info
        .versions
        .get(&Branch::Published)
        .copied()
        .ok_or_else(|| StoreError::NoSuchBranch {
            course: dest_course.clone(),
            branch: Branch::Published,
        })?;
    info.versions.insert(Branch::Draft, published_version);
    split.update_course_index(info)?;

    // Legacy parents may list children that only ever existed in the
    // draft tree; those references have no backing block here.
    split.internal_clean_children(&dest_published)?;
    Ok(())
}

/// Phase 2: lay draft deltas over the cloned draft branch, then adopt
/// private blocks into their parents.
fn add_draft_modules<S: SourceStore>(
    split: &mut SplitStore,
    source: &S,
    source_course: &CourseKey,
    dest_course: &CourseKey,
    dest_root_id: &BlockId,
) -> Result<()> {
    let dest_draft = dest_course.for_branch(Branch::Draft);
    // source id (version-agnostic) → destination id, for private blocks
    // whose parent hasn't been wired up yet.
    let mut awaiting_adoption: IndexMap<UsageKey, UsageKey> = IndexMap::new();

    for block in source.get_items(source_course, RevisionOption::DraftOnly) {
        let dest_key =
            dest_draft.make_usage_key(block.category().clone(), block.block_id().clone());
        if split.has_item(&dest_key) {
            // Existed in published too. The create path set every field
            // the published document had, so reconcile field by field:
            // drop what the draft doesn't set, then apply what it does.
            let mut existing = split.get_item(&dest_key)?;
            let stale: Vec<String> = existing
                .fields
                .keys()
                .filter(|name| !block.is_set(name))
                .cloned()
                .collect();
            for name in &stale {
                existing.unset(name);
            }
            for (name, value) in fields_translated(&block, dest_course, Some(dest_root_id)) {
                existing.set(name, value);
            }
            split.update_item(&existing)?;
        } else {
            let fields = json_fields_translated(&block, dest_course, Some(dest_root_id));
            let created = split.create_item(
                &dest_draft,
                block.category().clone(),
                block.block_id().clone(),
                fields,
            )?;
            awaiting_adoption.insert(block.location.version_agnostic(), created.location.clone());
        }
    }

    // Adoption pass: wire each private block into its parent's children
    // at the position the source ordering implies.
    for (source_key, dest_key) in &awaiting_adoption {
        let Some(parent_key) =
            source.get_parent_location(source_key, RevisionOption::DraftPreferred)
        else {
            tracing::warn!(
                block = %source_key,
                "no parent found in source; leaving block as a draft orphan"
            );
            continue;
        };

        let dest_parent_key = if parent_key.category.is_course() {
            dest_draft.make_usage_key(Category::COURSE, dest_root_id.clone())
        } else {
            parent_key.map_into_course(dest_draft.clone())
        };
        let mut dest_parent = split.get_item(&dest_parent_key)?;

        // Already adopted: an earlier entry sharing this parent updated
        // the children list with this block in it.
        if dest_parent.has_child(dest_key) {
            continue;
        }

        // Walk the source parent's children up to this block; each
        // preceding sibling found in the destination list pushes the
        // cursor past its position. The search resumes at the cursor
        // rather than index 0 — the cursor only ever moves forward, even
        // when the destination list orders siblings differently. This
        // reconstructs relative order even when the destination is
        // missing several of the source's children.
        let source_parent = source.get_item(&parent_key)?;
        let mut children = dest_parent.children().to_vec();
        let mut cursor = 0;
        for sibling in source_parent.children() {
            if sibling.version_agnostic() == *source_key {
                break;
            }
            let translated = translate_reference(sibling, dest_course, Some(dest_root_id));
            if let Some(pos) = children[cursor..]
                .iter()
                .position(|child| child.version_agnostic() == translated.version_agnostic())
            {
                cursor += pos + 1;
            }
        }
        children.insert(cursor, dest_key.version_agnostic());
        dest_parent.set_children(children);
        split.update_item(&dest_parent)?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
