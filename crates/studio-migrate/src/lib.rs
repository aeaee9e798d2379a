//! One-time migration of courses from the legacy dual-tree store into the
//! split branch-versioned store.

pub mod migrator;
pub mod translate;

pub use migrator::SplitMigrator;
pub use translate::{fields_translated, json_fields_translated, translate_reference};
