//! The store contract consumed by migration and authoring.
//!
//! `SourceStore` is the read side: everything the split migrator needs
//! from the store it copies out of. Keeping it a trait lets tests swap in
//! wrappers (e.g. shuffled iteration order) without touching the migrator.

use strum::Display;

use studio_types::{Block, CourseKey, UsageKey};

use crate::Result;

/// Which revision of the dual-tree legacy model a read addresses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RevisionOption {
    /// Only blocks present in the published tree.
    PublishedOnly,
    /// Only blocks with a draft document (modified or private).
    DraftOnly,
    /// The draft document when one exists, else the published one.
    DraftPreferred,
    /// Every block, draft-preferred per id.
    All,
}

/// Read contract for a migration source store.
///
/// `get_items` order is unspecified and unstable — callers must not rely
/// on tree order.
pub trait SourceStore {
    /// Fetch the course root block.
    fn get_course(&self, course_key: &CourseKey) -> Result<Block>;

    /// Fetch one block (draft-preferred).
    fn get_item(&self, usage_key: &UsageKey) -> Result<Block>;

    /// Whether a block exists at this key in any revision.
    fn has_item(&self, usage_key: &UsageKey) -> bool;

    /// Every block of the course visible under `revision`, in no
    /// particular order.
    fn get_items(&self, course_key: &CourseKey, revision: RevisionOption) -> Vec<Block>;

    /// The parent whose children list contains `usage_key`, if any.
    ///
    /// With [`RevisionOption::DraftPreferred`], a draft parent document
    /// wins over its published counterpart.
    fn get_parent_location(
        &self,
        usage_key: &UsageKey,
        revision: RevisionOption,
    ) -> Option<UsageKey>;
}
