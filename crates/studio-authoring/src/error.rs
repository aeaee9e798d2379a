//! Error types for authoring operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthoringError {
    /// A store-level failure, passed through uninterpreted.
    #[error(transparent)]
    Store(#[from] studio_store::StoreError),

    /// A request payload that doesn't type against the field schema or
    /// holds unparseable keys.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
