//! Typed keys for courses, content blocks, and structure versions.
//!
//! Keys are hierarchical: a [`CourseKey`] names a course (optionally pinned
//! to a branch), and a [`UsageKey`] names one block inside that course by
//! `(category, block_id)`. Both display as slash-separated strings for
//! logging and parse back with `FromStr`. [`VersionId`] wraps UUIDv7
//! (time-ordered) and is opaque — the split store hands them out, nothing
//! else mints them.
//!
//! Branch information lives on the course key, never on the block id, so
//! `version_agnostic()` equality (strip the branch, compare the rest) is a
//! cheap structural comparison.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Error from parsing a key string.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid course key '{0}' (expected org/course/run[@branch])")]
    InvalidCourseKey(String),
    #[error("invalid usage key '{0}' (expected org/course/run[@branch]/category/block_id)")]
    InvalidUsageKey(String),
    #[error("unknown branch '{0}'")]
    UnknownBranch(String),
}

/// A named branch of a course in the split store.
///
/// "published" is the master branch; "draft" tracks unpublished edits.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash,
    Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Published,
    Draft,
}

/// A block category ("course", "chapter", "vertical", "static_tab", ...).
///
/// Categories are an open set — new block types appear without code
/// changes — so this wraps a string rather than an enum. The schema table
/// in [`crate::schema`] closes over the categories it knows about.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// The distinguished course-root category.
    pub const COURSE: &'static str = "course";

    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the course-root category.
    ///
    /// Course references get special treatment everywhere: root block ids
    /// are not preserved across migration, so translation substitutes the
    /// destination root's id.
    pub fn is_course(&self) -> bool {
        self.0 == Self::COURSE
    }
}

impl From<&str> for Category {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category({})", self.0)
    }
}

/// A block identifier, unique within one course per category.
///
/// Legacy ids are human-chosen slugs; ids minted by the authoring layer
/// are uuid4 hex via [`BlockId::generate`].
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Mint a fresh id (32 hex chars, no hyphens).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().as_simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

/// Identifies a course, optionally pinned to a branch.
///
/// `org/course/run` is the stable identity; the branch qualifier selects
/// which tree of the split store a read or write addresses. Legacy-store
/// keys never carry a branch.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct CourseKey {
    pub org: String,
    pub course: String,
    pub run: String,
    pub branch: Option<Branch>,
}

impl CourseKey {
    /// A branch-less course key.
    pub fn new(org: impl Into<String>, course: impl Into<String>, run: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            course: course.into(),
            run: run.into(),
            branch: None,
        }
    }

    /// The same course addressed through `branch`.
    pub fn for_branch(&self, branch: Branch) -> Self {
        Self {
            branch: Some(branch),
            ..self.clone()
        }
    }

    /// The same course with the branch qualifier stripped.
    pub fn without_branch(&self) -> Self {
        Self {
            branch: None,
            ..self.clone()
        }
    }

    /// Override any subset of org/course/run, keeping the rest (and the
    /// branch qualifier) unchanged.
    pub fn replace_ids(&self, org: Option<&str>, course: Option<&str>, run: Option<&str>) -> Self {
        Self {
            org: org.map_or_else(|| self.org.clone(), str::to_string),
            course: course.map_or_else(|| self.course.clone(), str::to_string),
            run: run.map_or_else(|| self.run.clone(), str::to_string),
            branch: self.branch,
        }
    }

    /// Build a usage key for a block inside this course.
    ///
    /// The branch qualifier (if any) carries over onto the usage key's
    /// course scope.
    pub fn make_usage_key(&self, category: impl Into<Category>, block_id: impl Into<BlockId>) -> UsageKey {
        UsageKey {
            course_key: self.clone(),
            category: category.into(),
            block_id: block_id.into(),
        }
    }
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.org, self.course, self.run)?;
        if let Some(branch) = self.branch {
            write!(f, "@{branch}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CourseKey({self})")
    }
}

impl FromStr for CourseKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (path, branch) = match s.split_once('@') {
            Some((path, b)) => {
                let branch =
                    Branch::from_str(b).map_err(|_| KeyError::UnknownBranch(b.to_string()))?;
                (path, Some(branch))
            }
            None => (s, None),
        };
        let parts: Vec<&str> = path.split('/').collect();
        let [org, course, run] = parts[..] else {
            return Err(KeyError::InvalidCourseKey(s.to_string()));
        };
        if org.is_empty() || course.is_empty() || run.is_empty() {
            return Err(KeyError::InvalidCourseKey(s.to_string()));
        }
        Ok(Self {
            org: org.to_string(),
            course: course.to_string(),
            run: run.to_string(),
            branch,
        })
    }
}

/// Identifies one content block: course scope + category + block id.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct UsageKey {
    pub course_key: CourseKey,
    pub category: Category,
    pub block_id: BlockId,
}

impl UsageKey {
    /// Strip branch information for cross-branch equality comparison.
    ///
    /// Two usage keys that differ only in the branch of their course scope
    /// name the same logical block.
    pub fn version_agnostic(&self) -> Self {
        Self {
            course_key: self.course_key.without_branch(),
            ..self.clone()
        }
    }

    /// Re-root this key into another course's namespace, keeping category
    /// and block id.
    pub fn map_into_course(&self, course_key: CourseKey) -> Self {
        Self {
            course_key,
            category: self.category.clone(),
            block_id: self.block_id.clone(),
        }
    }
}

impl fmt::Display for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.course_key, self.category, self.block_id)
    }
}

impl fmt::Debug for UsageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UsageKey({self})")
    }
}

impl FromStr for UsageKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Rightmost two segments are category/block_id; the rest is the
        // course key (which may itself contain an @branch suffix).
        let mut parts = s.rsplitn(3, '/');
        let (Some(block_id), Some(category), Some(course)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(KeyError::InvalidUsageKey(s.to_string()));
        };
        if block_id.is_empty() || category.is_empty() {
            return Err(KeyError::InvalidUsageKey(s.to_string()));
        }
        let course_key =
            CourseKey::from_str(course).map_err(|_| KeyError::InvalidUsageKey(s.to_string()))?;
        Ok(Self {
            course_key,
            category: category.into(),
            block_id: block_id.into(),
        })
    }
}

/// An opaque structure-version identifier minted by the split store
/// (UUIDv7, time-ordered).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(uuid::Uuid);

impl VersionId {
    /// Mint a new time-ordered version id.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// First 8 hex characters — for human display only, not lookup.
    pub fn short(&self) -> String {
        self.0.as_simple().to_string()[..8].to_string()
    }

    /// Full 32-character hex string (no hyphens).
    pub fn to_hex(&self) -> String {
        self.0.as_simple().to_string()
    }

    /// A nil / zero id — for sentinel values only.
    pub fn nil() -> Self {
        Self(uuid::Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full UUID with hyphens for log readability
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", self.short())
    }
}

// ============================================================================
// Tests
// ============================================================================
