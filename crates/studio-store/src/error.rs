//! Error types for store operations.

use thiserror::Error;

use studio_types::{Branch, CourseKey, SchemaError, UsageKey};

/// Errors that can occur against either content store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The course already has an index / root.
    #[error("course already exists: {0}")]
    DuplicateCourse(CourseKey),

    /// A block with this key already exists in the addressed tree.
    #[error("item already exists: {0}")]
    DuplicateItem(UsageKey),

    /// No block at this key in the addressed tree.
    #[error("item not found: {0}")]
    ItemNotFound(UsageKey),

    /// No course registered under this key.
    #[error("course not found: {0}")]
    CourseNotFound(CourseKey),

    /// The course index has no version pointer for this branch.
    #[error("course {course} has no '{branch}' branch")]
    NoSuchBranch { course: CourseKey, branch: Branch },

    /// A split-store operation was addressed without a branch qualifier.
    #[error("operation requires a branch-qualified course key: {0}")]
    BranchRequired(CourseKey),

    /// A version id that doesn't root any stored structure.
    #[error("unknown structure version: {0}")]
    UnknownVersion(studio_types::VersionId),

    /// A bulk write scope is already open.
    #[error("bulk write scope already in progress for {0}")]
    BulkInProgress(CourseKey),

    /// Incoming field payload didn't match the field-kind schema.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
