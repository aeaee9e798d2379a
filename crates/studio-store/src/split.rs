//! The split branch-versioned store.
//!
//! A course is addressed by a stable course key; its index maps branch
//! names to opaque version ids, and each version id roots an immutable
//! structure snapshot. Every write clones the affected branch's structure
//! into a fresh version and moves the branch pointer — except inside a
//! [`SplitStore::bulk_write_operations`] scope, where writes share one
//! working version per branch and pointers land when the scope closes.
//!
//! Blocks are stored with branch-less locations inside structures (a
//! structure can be shared by several branches); reads brand the returned
//! location with the branch the caller addressed.

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

use studio_types::{
    Block, BlockId, Branch, Category, CourseKey, UsageKey, VersionId, parse_field,
};

use crate::error::StoreError;
use crate::Result;

/// Incoming field payload for item creation: JSON values, typed against
/// the schema on the way in.
pub type JsonFields = BTreeMap<String, serde_json::Value>;

/// Index entry for one course: branch name → version pointer.
#[derive(Clone, Debug)]
pub struct CourseIndex {
    /// The course (no branch qualifier).
    pub course: CourseKey,
    /// Branch pointers. Every value roots an immutable structure.
    pub versions: BTreeMap<Branch, VersionId>,
}

type BlockKey = (Category, BlockId);

/// One immutable tree snapshot.
#[derive(Clone, Default)]
struct Structure {
    root: Option<BlockKey>,
    blocks: IndexMap<BlockKey, Block>,
}

impl Structure {
    fn block_key(usage_key: &UsageKey) -> BlockKey {
        (usage_key.category.clone(), usage_key.block_id.clone())
    }
}

/// An open bulk-write scope: per-branch working versions not yet visible
/// through the committed index.
struct BulkScope {
    course: CourseKey,
    working: BTreeMap<Branch, VersionId>,
}

/// In-memory split store.
#[derive(Default)]
pub struct SplitStore {
    /// Course key (no branch) → index.
    indexes: HashMap<CourseKey, CourseIndex>,
    /// All structure versions ever produced. GC is out of scope.
    structures: HashMap<VersionId, Structure>,
    bulk: Option<BulkScope>,
}

impl SplitStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Course lifecycle ────────────────────────────────────────────────

    /// Create a course: an index with `master_branch` pointing at a fresh
    /// structure containing just the root block (`course/<run>`).
    ///
    /// Fails with [`StoreError::DuplicateCourse`] if the course id already
    /// has an index — there is no merge-into-existing support.
    pub fn create_course(
        &mut self,
        org: impl Into<String>,
        course: impl Into<String>,
        run: impl Into<String>,
        fields: JsonFields,
        master_branch: Branch,
    ) -> Result<Block> {
        let run = run.into();
        let course_key = CourseKey::new(org, course, run.clone());
        if self.indexes.contains_key(&course_key) {
            return Err(StoreError::DuplicateCourse(course_key));
        }

        let location = course_key.make_usage_key(Category::COURSE, run);
        let root = Block::with_fields(location.clone(), typed_fields(&location.category, fields)?);

        let version = VersionId::new();
        let root_key = Structure::block_key(&location);
        let mut structure = Structure {
            root: Some(root_key.clone()),
            blocks: IndexMap::new(),
        };
        structure.blocks.insert(root_key, root.clone());
        self.structures.insert(version, structure);

        self.indexes.insert(
            course_key.clone(),
            CourseIndex {
                course: course_key.clone(),
                versions: BTreeMap::from([(master_branch, version)]),
            },
        );

        let mut branded = root;
        branded.location = branded
            .location
            .map_into_course(course_key.for_branch(master_branch));
        Ok(branded)
    }

    // ── Block writes ────────────────────────────────────────────────────

    /// Create a block in the addressed branch, producing a new version
    /// (or extending the open bulk working version).
    ///
    /// Child references in `fields` are not validated here — a referenced
    /// child may be created later in the same batch. Dangling refs are the
    /// caller's problem until [`SplitStore::internal_clean_children`].
    pub fn create_item(
        &mut self,
        course_key: &CourseKey,
        category: impl Into<Category>,
        block_id: impl Into<BlockId>,
        fields: JsonFields,
    ) -> Result<Block> {
        let category = category.into();
        let block_id = block_id.into();
        let fields = typed_fields(&category, fields)?;

        let version = self.writable_version(course_key)?;
        let structure = self
            .structures
            .get_mut(&version)
            .ok_or(StoreError::UnknownVersion(version))?;

        let key: BlockKey = (category.clone(), block_id.clone());
        if structure.blocks.contains_key(&key) {
            return Err(StoreError::DuplicateItem(
                course_key.make_usage_key(category, block_id),
            ));
        }

        let location = course_key
            .without_branch()
            .make_usage_key(category.clone(), block_id.clone());
        let block = Block::with_fields(location, fields);
        structure.blocks.insert(key, block.clone());

        let mut branded = block;
        branded.location = branded.location.map_into_course(course_key.clone());
        Ok(branded)
    }

    /// Persist an updated block into its branch, producing a new version
    /// (or extending the open bulk working version).
    pub fn update_item(&mut self, block: &Block) -> Result<Block> {
        let course_key = block.location.course_key.clone();
        let version = self.writable_version(&course_key)?;
        let structure = self
            .structures
            .get_mut(&version)
            .ok_or(StoreError::UnknownVersion(version))?;

        let key = Structure::block_key(&block.location);
        if !structure.blocks.contains_key(&key) {
            return Err(StoreError::ItemNotFound(block.location.clone()));
        }

        let mut stored = block.clone();
        stored.location = stored.location.version_agnostic();
        structure.blocks.insert(key, stored);
        Ok(block.clone())
    }

    /// Remove a block from its branch, producing a new version.
    pub fn delete_item(&mut self, usage_key: &UsageKey) -> Result<()> {
        let course_key = usage_key.course_key.clone();
        let version = self.writable_version(&course_key)?;
        let structure = self
            .structures
            .get_mut(&version)
            .ok_or(StoreError::UnknownVersion(version))?;
        let key = Structure::block_key(usage_key);
        structure
            .blocks
            .shift_remove(&key)
            .ok_or_else(|| StoreError::ItemNotFound(usage_key.clone()))?;
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Fetch a block from the addressed branch.
    pub fn get_item(&self, usage_key: &UsageKey) -> Result<Block> {
        let version = self.resolve_version(&usage_key.course_key)?;
        let structure = self
            .structures
            .get(&version)
            .ok_or(StoreError::UnknownVersion(version))?;
        let key = Structure::block_key(usage_key);
        let block = structure
            .blocks
            .get(&key)
            .ok_or_else(|| StoreError::ItemNotFound(usage_key.clone()))?;
        let mut branded = block.clone();
        branded.location = branded.location.map_into_course(usage_key.course_key.clone());
        Ok(branded)
    }

    /// Whether a block exists in the addressed branch.
    pub fn has_item(&self, usage_key: &UsageKey) -> bool {
        self.resolve_version(&usage_key.course_key)
            .ok()
            .and_then(|version| self.structures.get(&version))
            .is_some_and(|structure| {
                structure.blocks.contains_key(&Structure::block_key(usage_key))
            })
    }

    /// The course root block of the addressed branch.
    pub fn get_course(&self, course_key: &CourseKey) -> Result<Block> {
        let version = self.resolve_version(course_key)?;
        let structure = self
            .structures
            .get(&version)
            .ok_or(StoreError::UnknownVersion(version))?;
        let root = structure
            .root
            .as_ref()
            .ok_or_else(|| StoreError::CourseNotFound(course_key.clone()))?;
        let block = structure
            .blocks
            .get(root)
            .ok_or_else(|| StoreError::CourseNotFound(course_key.clone()))?;
        let mut branded = block.clone();
        branded.location = branded.location.map_into_course(course_key.clone());
        Ok(branded)
    }

    /// Every block of the addressed branch, in structure order.
    pub fn get_items(&self, course_key: &CourseKey) -> Result<Vec<Block>> {
        let version = self.resolve_version(course_key)?;
        let structure = self
            .structures
            .get(&version)
            .ok_or(StoreError::UnknownVersion(version))?;
        Ok(structure
            .blocks
            .values()
            .map(|block| {
                let mut branded = block.clone();
                branded.location = branded.location.map_into_course(course_key.clone());
                branded
            })
            .collect())
    }

    /// The version the addressed branch currently resolves to (bulk
    /// working versions included).
    pub fn version_of(&self, course_key: &CourseKey) -> Result<VersionId> {
        self.resolve_version(course_key)
    }

    /// Whether this version id still roots a retrievable structure.
    pub fn has_version(&self, version: &VersionId) -> bool {
        self.structures.contains_key(version)
    }

    // ── Index operations ────────────────────────────────────────────────

    /// The course's index with any open bulk working versions overlaid —
    /// within a bulk scope, reads see the scope's own writes.
    pub fn get_course_index_info(&self, course_key: &CourseKey) -> Result<CourseIndex> {
        let course_id = course_key.without_branch();
        let index = self
            .indexes
            .get(&course_id)
            .ok_or(StoreError::CourseNotFound(course_id))?;
        let mut info = index.clone();
        if let Some(bulk) = &self.bulk
            && bulk.course == info.course
        {
            for (branch, version) in &bulk.working {
                info.versions.insert(*branch, *version);
            }
        }
        Ok(info)
    }

    /// Replace the course's branch pointers. Every pointer must name a
    /// structure this store actually holds.
    pub fn update_course_index(&mut self, info: CourseIndex) -> Result<()> {
        for version in info.versions.values() {
            if !self.structures.contains_key(version) {
                return Err(StoreError::UnknownVersion(*version));
            }
        }
        let index = self
            .indexes
            .get_mut(&info.course)
            .ok_or_else(|| StoreError::CourseNotFound(info.course.clone()))?;
        index.versions = info.versions;
        Ok(())
    }

    /// Strip child references that have no backing block in the addressed
    /// branch's structure.
    ///
    /// Repairs in place (same version id): a branch pointer cloned from
    /// this one sees the repair too. This is the cleanup for legacy
    /// parents whose children lists held the union of draft and published
    /// children.
    pub fn internal_clean_children(&mut self, course_key: &CourseKey) -> Result<()> {
        let version = self.resolve_version(course_key)?;
        let structure = self
            .structures
            .get_mut(&version)
            .ok_or(StoreError::UnknownVersion(version))?;

        let existing: Vec<BlockKey> = structure.blocks.keys().cloned().collect();
        for block in structure.blocks.values_mut() {
            if block.is_set(studio_types::CHILDREN_FIELD) {
                let kept: Vec<UsageKey> = block
                    .children()
                    .iter()
                    .filter(|child| existing.contains(&Structure::block_key(child)))
                    .cloned()
                    .collect();
                block.set_children(kept);
            }
        }
        Ok(())
    }

    // ── Bulk writes ─────────────────────────────────────────────────────

    /// Run `f` inside a bulk-write scope for one course.
    ///
    /// Writes inside the scope share one working version per branch;
    /// committed branch pointers move only when the scope closes cleanly.
    /// On failure the working versions are discarded and the committed
    /// index is untouched — best-effort batching, not a transaction.
    pub fn bulk_write_operations<R>(
        &mut self,
        course_key: &CourseKey,
        f: impl FnOnce(&mut Self) -> Result<R>,
    ) -> Result<R> {
        let course_id = course_key.without_branch();
        if !self.indexes.contains_key(&course_id) {
            return Err(StoreError::CourseNotFound(course_id));
        }
        if let Some(open) = &self.bulk {
            return Err(StoreError::BulkInProgress(open.course.clone()));
        }

        self.bulk = Some(BulkScope {
            course: course_id,
            working: BTreeMap::new(),
        });

        let result = f(self);

        // The scope is ours to close: opening another scope inside is
        // rejected above, and nothing else clears `bulk`.
        let Some(scope) = self.bulk.take() else {
            return result;
        };
        match &result {
            Ok(_) => {
                if let Some(index) = self.indexes.get_mut(&scope.course) {
                    for (branch, version) in scope.working {
                        index.versions.insert(branch, version);
                    }
                }
            }
            Err(_) => {
                for version in scope.working.values() {
                    self.structures.remove(version);
                }
            }
        }
        result
    }

    // ── Internals ───────────────────────────────────────────────────────

    /// Resolve a branch-qualified course key to its effective version:
    /// the open bulk working version if there is one, else the committed
    /// branch pointer.
    fn resolve_version(&self, course_key: &CourseKey) -> Result<VersionId> {
        let branch = course_key
            .branch
            .ok_or_else(|| StoreError::BranchRequired(course_key.clone()))?;
        let course_id = course_key.without_branch();
        let index = self
            .indexes
            .get(&course_id)
            .ok_or_else(|| StoreError::CourseNotFound(course_id.clone()))?;

        if let Some(bulk) = &self.bulk
            && bulk.course == course_id
            && let Some(version) = bulk.working.get(&branch)
        {
            return Ok(*version);
        }

        index.versions.get(&branch).copied().ok_or(StoreError::NoSuchBranch {
            course: course_id,
            branch,
        })
    }

    /// The version a write to this branch should mutate: the bulk working
    /// version (opened on first write), or a fresh clone of the current
    /// structure with the branch pointer moved immediately.
    fn writable_version(&mut self, course_key: &CourseKey) -> Result<VersionId> {
        let branch = course_key
            .branch
            .ok_or_else(|| StoreError::BranchRequired(course_key.clone()))?;
        let course_id = course_key.without_branch();
        if !self.indexes.contains_key(&course_id) {
            return Err(StoreError::CourseNotFound(course_id));
        }

        let in_bulk = self
            .bulk
            .as_ref()
            .is_some_and(|bulk| bulk.course == course_id);

        if in_bulk {
            if let Some(bulk) = &self.bulk
                && let Some(version) = bulk.working.get(&branch)
            {
                return Ok(*version);
            }
            let version = self.clone_branch_structure(&course_id, branch);
            if let Some(bulk) = &mut self.bulk {
                bulk.working.insert(branch, version);
            }
            Ok(version)
        } else {
            let version = self.clone_branch_structure(&course_id, branch);
            let index = self
                .indexes
                .get_mut(&course_id)
                .ok_or(StoreError::CourseNotFound(course_id))?;
            index.versions.insert(branch, version);
            Ok(version)
        }
    }

    /// Clone the branch's current structure (empty if the branch has no
    /// pointer yet) under a fresh version id.
    fn clone_branch_structure(&mut self, course_id: &CourseKey, branch: Branch) -> VersionId {
        let base = self
            .indexes
            .get(course_id)
            .and_then(|index| index.versions.get(&branch))
            .copied();
        let structure = base
            .and_then(|version| self.structures.get(&version))
            .cloned()
            .unwrap_or_default();
        let version = VersionId::new();
        self.structures.insert(version, structure);
        version
    }
}

/// Type a JSON field payload against the schema for this category.
fn typed_fields(category: &Category, fields: JsonFields) -> Result<studio_types::Fields> {
    let mut typed = studio_types::Fields::new();
    for (name, value) in fields {
        let field = parse_field(category, &name, value)?;
        typed.insert(name, field);
    }
    Ok(typed)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn new_course(store: &mut SplitStore) -> CourseKey {
        store
            .create_course("edX", "toy", "2012_Fall", JsonFields::new(), Branch::Published)
            .unwrap();
        CourseKey::new("edX", "toy", "2012_Fall")
    }

    #[test]
    fn test_create_course_sets_root_and_branch() {
        let mut store = SplitStore::new();
        let course = new_course(&mut store);
        let published = course.for_branch(Branch::Published);

        let root = store.get_course(&published).unwrap();
        assert!(root.is_course_root());
        assert_eq!(root.block_id().as_str(), "2012_Fall");
        assert_eq!(root.location.course_key, published);

        // No draft branch yet
        let draft = course.for_branch(Branch::Draft);
        assert!(matches!(
            store.get_course(&draft),
            Err(StoreError::NoSuchBranch { .. })
        ));
    }

    #[test]
    fn test_duplicate_course_rejected() {
        let mut store = SplitStore::new();
        new_course(&mut store);
        let err = store.create_course(
            "edX",
            "toy",
            "2012_Fall",
            JsonFields::new(),
            Branch::Published,
        );
        assert!(matches!(err, Err(StoreError::DuplicateCourse(_))));
    }

    #[test]
    fn test_every_write_produces_a_new_version() {
        let mut store = SplitStore::new();
        let published = new_course(&mut store).for_branch(Branch::Published);

        let v0 = store.version_of(&published).unwrap();
        store
            .create_item(&published, "chapter", "ch1", JsonFields::new())
            .unwrap();
        let v1 = store.version_of(&published).unwrap();
        assert_ne!(v0, v1);

        // Old version stays retrievable
        assert!(store.has_version(&v0));

        let mut block = store
            .get_item(&published.make_usage_key("chapter", "ch1"))
            .unwrap();
        block.set_display_name("Chapter One");
        store.update_item(&block).unwrap();
        let v2 = store.version_of(&published).unwrap();
        assert_ne!(v1, v2);
        assert!(store.has_version(&v1));
    }

    #[test]
    fn test_update_missing_item_errors() {
        let mut store = SplitStore::new();
        let published = new_course(&mut store).for_branch(Branch::Published);
        let ghost = Block::new(published.make_usage_key("html", "nope"));
        assert!(matches!(
            store.update_item(&ghost),
            Err(StoreError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_delete_item() {
        let mut store = SplitStore::new();
        let published = new_course(&mut store).for_branch(Branch::Published);
        store
            .create_item(&published, "html", "intro", JsonFields::new())
            .unwrap();
        let key = published.make_usage_key("html", "intro");
        assert!(store.has_item(&key));
        store.delete_item(&key).unwrap();
        assert!(!store.has_item(&key));
    }

    #[test]
    fn test_branch_pointer_clone_shares_structure() {
        let mut store = SplitStore::new();
        let course = new_course(&mut store);
        let published = course.for_branch(Branch::Published);
        store
            .create_item(&published, "chapter", "ch1", JsonFields::new())
            .unwrap();

        // Point draft at published's version
        let mut info = store.get_course_index_info(&course).unwrap();
        let pub_version = info.versions[&Branch::Published];
        info.versions.insert(Branch::Draft, pub_version);
        store.update_course_index(info).unwrap();

        let draft = course.for_branch(Branch::Draft);
        assert!(store.has_item(&draft.make_usage_key("chapter", "ch1")));

        // A draft write diverges without touching published
        store
            .create_item(&draft, "vertical", "v1", JsonFields::new())
            .unwrap();
        assert!(store.has_item(&draft.make_usage_key("vertical", "v1")));
        assert!(!store.has_item(&published.make_usage_key("vertical", "v1")));
    }

    #[test]
    fn test_internal_clean_children_strips_dangling() {
        let mut store = SplitStore::new();
        let course = new_course(&mut store);
        let published = course.for_branch(Branch::Published);

        let real = published.make_usage_key("vertical", "v1");
        let ghost = published.make_usage_key("vertical", "ghost");
        let children = serde_json::json!([real.to_string(), ghost.to_string()]);
        store
            .create_item(
                &published,
                "chapter",
                "ch1",
                JsonFields::from([("children".to_string(), children)]),
            )
            .unwrap();
        store
            .create_item(&published, "vertical", "v1", JsonFields::new())
            .unwrap();

        store.internal_clean_children(&published).unwrap();

        let chapter = store
            .get_item(&published.make_usage_key("chapter", "ch1"))
            .unwrap();
        assert_eq!(chapter.children().len(), 1);
        assert_eq!(chapter.children()[0].block_id.as_str(), "v1");
    }

    #[test]
    fn test_bulk_coalesces_writes_into_one_version() {
        let mut store = SplitStore::new();
        let course = new_course(&mut store);
        let published = course.for_branch(Branch::Published);
        let v0 = store.version_of(&published).unwrap();

        store
            .bulk_write_operations(&course, |store| {
                store.create_item(&published, "chapter", "ch1", JsonFields::new())?;
                store.create_item(&published, "chapter", "ch2", JsonFields::new())?;
                // Reads inside the scope see the writes
                assert!(store.has_item(&published.make_usage_key("chapter", "ch1")));
                Ok(())
            })
            .unwrap();

        let v1 = store.version_of(&published).unwrap();
        assert_ne!(v0, v1);
        assert!(store.has_item(&published.make_usage_key("chapter", "ch2")));
    }

    #[test]
    fn test_bulk_failure_leaves_committed_index_untouched() {
        let mut store = SplitStore::new();
        let course = new_course(&mut store);
        let published = course.for_branch(Branch::Published);
        let v0 = store.version_of(&published).unwrap();

        let result: Result<()> = store.bulk_write_operations(&course, |store| {
            store.create_item(&published, "chapter", "ch1", JsonFields::new())?;
            Err(StoreError::ItemNotFound(
                published.make_usage_key("html", "whatever"),
            ))
        });
        assert!(result.is_err());
        assert_eq!(store.version_of(&published).unwrap(), v0);
        assert!(!store.has_item(&published.make_usage_key("chapter", "ch1")));
    }

    #[test]
    fn test_nested_bulk_rejected() {
        let mut store = SplitStore::new();
        let course = new_course(&mut store);
        let result: Result<()> = store.bulk_write_operations(&course.clone(), |store| {
            store.bulk_write_operations(&course, |_| Ok(()))
        });
        assert!(matches!(result, Err(StoreError::BulkInProgress(_))));
    }

    #[test]
    fn test_branch_required_for_reads() {
        let mut store = SplitStore::new();
        let course = new_course(&mut store);
        assert!(matches!(
            store.get_course(&course),
            Err(StoreError::BranchRequired(_))
        ));
    }
}
