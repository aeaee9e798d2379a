//! Programmatic course-content editing: the save / create / duplicate /
//! delete operations Studio performs against the legacy store, plus
//! orphan listing and cleanup.

pub mod error;
pub mod item;

pub use error::AuthoringError;
pub use item::{
    UpdateRequest, create_block, delete_block, delete_orphans, duplicate_block, get_orphans,
    update_block,
};

pub type Result<T> = std::result::Result<T, AuthoringError>;
