//! Content stores: the legacy dual-tree store courses migrate out of,
//! and the split branch-versioned store they migrate into.

pub mod error;
pub mod legacy;
pub mod split;
pub mod store;

pub use error::StoreError;
pub use legacy::LegacyStore;
pub use split::{CourseIndex, JsonFields, SplitStore};
pub use store::{RevisionOption, SourceStore};

pub type Result<T> = std::result::Result<T, StoreError>;
