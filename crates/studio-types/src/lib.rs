//! Shared key and content-block types for studio.
//!
//! The data model in one sentence: a course is a tree of content blocks,
//! each identified by `(course scope, category, block id)` and carrying a
//! map of explicitly-set fields, where containment is an ordered list of
//! child references rather than embedded objects.
//!
//! Two stores speak this model. The legacy store keeps two parallel
//! unversioned trees (published + draft) sharing block ids; the split
//! store keeps one immutable structure per version with named branches
//! pointing at versions. The types here are store-agnostic — branch
//! addressing lives on [`CourseKey`], and [`UsageKey::version_agnostic`]
//! compares block identity across branches.

pub mod block;
pub mod fields;
pub mod keys;
pub mod schema;
pub mod tabs;

pub use block::{Block, DISPLAY_NAME_FIELD, TABS_FIELD};
pub use fields::{FieldValue, Fields};
pub use keys::{Branch, BlockId, Category, CourseKey, KeyError, UsageKey, VersionId};
pub use schema::{
    CHILDREN_FIELD, DETACHED_CATEGORIES, DIRECT_ONLY_CATEGORIES, FieldKind, SchemaError,
    field_kind, is_detached, is_direct_only, parse_field,
};
pub use tabs::{CourseTab, STATIC_TAB_TYPE, TabList};
