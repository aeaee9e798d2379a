//! The legacy dual-tree store.
//!
//! Draft and published are two parallel unversioned trees whose documents
//! share block ids. A block with only a draft document is "private". Writes
//! route by category: direct-only categories (course, chapter, ...) go
//! straight to the published tree, everything else gets a draft document —
//! cloned from published on first edit.
//!
//! Known data defect this store exhibits (and the split migrator repairs):
//! a published parent's children list holds the union of its published and
//! draft children, so it can point at blocks that only exist in the draft
//! tree.

use std::collections::{HashMap, HashSet, VecDeque};

use studio_types::{Block, Category, CourseKey, Fields, UsageKey, is_detached, is_direct_only};

use crate::error::StoreError;
use crate::store::{RevisionOption, SourceStore};
use crate::Result;

/// In-memory legacy store: two trees of blocks keyed by branch-less usage
/// keys, plus a course-root registry.
#[derive(Default)]
pub struct LegacyStore {
    /// Course key (no branch) → root block location.
    roots: HashMap<CourseKey, UsageKey>,
    /// The published tree.
    published: HashMap<UsageKey, Block>,
    /// The draft tree. Holds modified copies and private blocks.
    drafts: HashMap<UsageKey, Block>,
}

impl LegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a course and create its root block in the published tree.
    pub fn create_course(
        &mut self,
        org: impl Into<String>,
        course: impl Into<String>,
        run: impl Into<String>,
        fields: Fields,
    ) -> Result<Block> {
        let run = run.into();
        let course_key = CourseKey::new(org, course, run.clone());
        if self.roots.contains_key(&course_key) {
            return Err(StoreError::DuplicateCourse(course_key));
        }
        let location = course_key.make_usage_key(Category::COURSE, run);
        let root = Block::with_fields(location.clone(), fields);
        self.roots.insert(course_key, location.clone());
        self.published.insert(location, root.clone());
        Ok(root)
    }

    /// Create a block. Direct-only categories land in the published tree;
    /// everything else starts life as a private draft.
    pub fn create_item(&mut self, location: UsageKey, fields: Fields) -> Result<Block> {
        let location = location.version_agnostic();
        let tree = self.tree_for_mut(&location.category);
        if tree.contains_key(&location) {
            return Err(StoreError::DuplicateItem(location));
        }
        let block = Block::with_fields(location.clone(), fields);
        tree.insert(location, block.clone());
        Ok(block)
    }

    /// Persist an updated block.
    ///
    /// Draftable categories always write the draft tree — editing a
    /// published block clones it into a draft document.
    pub fn update_item(&mut self, block: &Block) -> Result<Block> {
        let location = block.location.version_agnostic();
        let mut stored = block.clone();
        stored.location = location.clone();

        if is_direct_only(&location.category) {
            if !self.published.contains_key(&location) {
                return Err(StoreError::ItemNotFound(location));
            }
            self.published.insert(location, stored.clone());
        } else {
            if !self.drafts.contains_key(&location) && !self.published.contains_key(&location) {
                return Err(StoreError::ItemNotFound(location));
            }
            self.drafts.insert(location, stored.clone());
        }
        Ok(stored)
    }

    /// Promote a draft document to published and drop the draft.
    pub fn publish(&mut self, usage_key: &UsageKey) -> Result<Block> {
        let location = usage_key.version_agnostic();
        let block = self
            .drafts
            .remove(&location)
            .ok_or_else(|| StoreError::ItemNotFound(location.clone()))?;
        self.published.insert(location, block.clone());
        Ok(block)
    }

    /// Delete a block from the addressed revision(s).
    pub fn delete_item(&mut self, usage_key: &UsageKey, revision: RevisionOption) -> Result<()> {
        let location = usage_key.version_agnostic();
        let removed = match revision {
            RevisionOption::PublishedOnly => self.published.remove(&location).is_some(),
            RevisionOption::DraftOnly => self.drafts.remove(&location).is_some(),
            RevisionOption::All | RevisionOption::DraftPreferred => {
                let a = self.drafts.remove(&location).is_some();
                let b = self.published.remove(&location).is_some();
                a || b
            }
        };
        if removed {
            Ok(())
        } else {
            Err(StoreError::ItemNotFound(location))
        }
    }

    /// Fetch a block from one specific revision.
    pub fn get_item_at(&self, usage_key: &UsageKey, revision: RevisionOption) -> Result<Block> {
        let location = usage_key.version_agnostic();
        let found = match revision {
            RevisionOption::PublishedOnly => self.published.get(&location),
            RevisionOption::DraftOnly => self.drafts.get(&location),
            RevisionOption::DraftPreferred | RevisionOption::All => {
                self.drafts.get(&location).or_else(|| self.published.get(&location))
            }
        };
        found.cloned().ok_or(StoreError::ItemNotFound(location))
    }

    /// Whether this block exists only as a draft (no published document).
    pub fn is_private(&self, usage_key: &UsageKey) -> bool {
        let location = usage_key.version_agnostic();
        self.drafts.contains_key(&location) && !self.published.contains_key(&location)
    }

    /// Blocks unreachable from the course root via child containment,
    /// excluding detached categories and the root itself.
    pub fn get_orphans(&self, course_key: &CourseKey) -> Vec<UsageKey> {
        let course_id = course_key.without_branch();
        let Some(root) = self.roots.get(&course_id) else {
            return Vec::new();
        };

        // Reachability over the draft-preferred view.
        let mut reachable: HashSet<UsageKey> = HashSet::new();
        let mut queue = VecDeque::from([root.clone()]);
        while let Some(loc) = queue.pop_front() {
            if !reachable.insert(loc.clone()) {
                continue;
            }
            if let Ok(block) = self.get_item_at(&loc, RevisionOption::DraftPreferred) {
                for child in block.children() {
                    queue.push_back(child.version_agnostic());
                }
            }
        }

        let mut orphans: Vec<UsageKey> = self
            .course_keys(&course_id)
            .filter(|loc| {
                *loc != root && !is_detached(&loc.category) && !reachable.contains(loc)
            })
            .cloned()
            .collect();
        orphans.sort();
        orphans.dedup();
        orphans
    }

    fn tree_for_mut(&mut self, category: &Category) -> &mut HashMap<UsageKey, Block> {
        if is_direct_only(category) {
            &mut self.published
        } else {
            &mut self.drafts
        }
    }

    fn course_keys<'a>(&'a self, course_id: &'a CourseKey) -> impl Iterator<Item = &'a UsageKey> {
        self.published
            .keys()
            .chain(self.drafts.keys())
            .filter(move |loc| loc.course_key == *course_id)
    }
}

impl SourceStore for LegacyStore {
    fn get_course(&self, course_key: &CourseKey) -> Result<Block> {
        let course_id = course_key.without_branch();
        let root = self
            .roots
            .get(&course_id)
            .ok_or(StoreError::CourseNotFound(course_id))?;
        self.get_item_at(root, RevisionOption::DraftPreferred)
    }

    fn get_item(&self, usage_key: &UsageKey) -> Result<Block> {
        self.get_item_at(usage_key, RevisionOption::DraftPreferred)
    }

    fn has_item(&self, usage_key: &UsageKey) -> bool {
        let location = usage_key.version_agnostic();
        self.drafts.contains_key(&location) || self.published.contains_key(&location)
    }

    fn get_items(&self, course_key: &CourseKey, revision: RevisionOption) -> Vec<Block> {
        let course_id = course_key.without_branch();
        let in_course = |block: &&Block| block.location.course_key == course_id;
        match revision {
            RevisionOption::PublishedOnly => {
                self.published.values().filter(in_course).cloned().collect()
            }
            RevisionOption::DraftOnly => self.drafts.values().filter(in_course).cloned().collect(),
            RevisionOption::DraftPreferred | RevisionOption::All => self
                .drafts
                .values()
                .filter(in_course)
                .chain(
                    self.published
                        .values()
                        .filter(in_course)
                        .filter(|b| !self.drafts.contains_key(&b.location)),
                )
                .cloned()
                .collect(),
        }
    }

    fn get_parent_location(
        &self,
        usage_key: &UsageKey,
        revision: RevisionOption,
    ) -> Option<UsageKey> {
        let target = usage_key.version_agnostic();
        let find = |tree: &HashMap<UsageKey, Block>| {
            tree.values()
                .filter(|b| b.location.course_key == target.course_key)
                .find(|b| b.has_child(&target))
                .map(|b| b.location.clone())
        };
        match revision {
            RevisionOption::PublishedOnly => find(&self.published),
            RevisionOption::DraftOnly => find(&self.drafts),
            RevisionOption::DraftPreferred | RevisionOption::All => {
                find(&self.drafts).or_else(|| find(&self.published))
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
