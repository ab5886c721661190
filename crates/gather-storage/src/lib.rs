//! Storage abstraction for gather.
//!
//! Backend crates (e.g., gather-store-sqlite) implement these traits so the
//! server doesn't depend on any specific database engine or schema details.

use thiserror::Error;

mod store;
mod types;

pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    /// The id is not in the backend's format, so it cannot name any document.
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("backend error: {0}")]
    Backend(String),
}
